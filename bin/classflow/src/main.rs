mod error;

use classflow::jvm::code::{
    BytecodeStream, ConstantData, ConstantEntry, ConstantTable, ExceptionHandler, FieldRef,
    InvokeDynamicRef, MethodRef, VerifierInstruction,
};
use classflow::jvm::verifier::{Analyzer, Frame, FrameLogger, MethodContext};
use classflow::jvm::{
    BinaryName, FieldType, MethodDescriptor, Name, ParseDescriptor, RefType, UnqualifiedName,
};
use classflow::util::Offset;
use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use error::CliError;
use std::process;

fn main() {
    env_logger::init();

    let matches = Command::new("JVM method frame analyzer")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Compute the verification frame at every instruction of a JVM method body")
        .arg(
            Arg::new("owner")
                .long("owner")
                .value_name("CLASS_NAME")
                .required(true)
                .action(ArgAction::Set)
                .help("Class declaring the method (eg. `foo/bar/Baz`)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("METHOD_NAME")
                .required(true)
                .action(ArgAction::Set)
                .help("Name of the method (eg. `<init>` or `run`)"),
        )
        .arg(
            Arg::new("descriptor")
                .long("descriptor")
                .value_name("DESCRIPTOR")
                .required(true)
                .action(ArgAction::Set)
                .help("Method descriptor (eg. `(IJ)V`)"),
        )
        .arg(
            Arg::new("static")
                .long("static")
                .action(ArgAction::SetTrue)
                .help("The method is static (no `this` in local 0)"),
        )
        .arg(
            Arg::new("code")
                .long("code")
                .value_name("HEX")
                .required(true)
                .action(ArgAction::Set)
                .help("Bytecode of the method, in hexadecimal (whitespace is ignored)"),
        )
        .arg(
            Arg::new("constant")
                .long("constant")
                .value_name("INDEX=KIND:VALUE")
                .action(ArgAction::Append)
                .help(
                    "Constant pool entry. Kinds: int, float, long, double, string, class, \
                     methodtype, methodhandle, field (CLASS.NAME:DESC), method and imethod \
                     (CLASS.NAME:DESC), indy (NAME:DESC)",
                ),
        )
        .arg(
            Arg::new("handler")
                .long("handler")
                .value_name("START,END,HANDLER[,CLASS]")
                .action(ArgAction::Append)
                .help("Exception table entry, in table order"),
        )
        .arg(
            Arg::new("stack-map")
                .long("stack-map")
                .action(ArgAction::SetTrue)
                .help("Also print the stack map table derived from the frames"),
        )
        .get_matches();

    if let Err(err) = run(&matches) {
        log::error!("{:?}", err);
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), CliError> {
    let method = MethodContext {
        owner: binary_name("owner", required(matches, "owner")?)?,
        name: UnqualifiedName::from_string(required(matches, "name")?.to_owned())
            .map_err(|msg| CliError::argument("name", msg))?,
        descriptor: MethodDescriptor::parse(required(matches, "descriptor")?)?,
        is_static: matches.get_flag("static"),
    };

    let bytecode = parse_hex(required(matches, "code")?)?;
    let code = BytecodeStream::new(&bytecode)?;

    let mut constants = ConstantTable::new();
    for constant in matches.get_many::<String>("constant").into_iter().flatten() {
        let (index, entry) = parse_constant(constant)?;
        if constants.insert(index, entry).is_some() {
            log::warn!("Constant {} was given more than once", index);
        }
    }

    let handlers = matches
        .get_many::<String>("handler")
        .into_iter()
        .flatten()
        .map(|handler| parse_handler(handler))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "Analyzing {} bytes of code with {} constants and {} handlers",
        bytecode.len(),
        constants.len(),
        handlers.len()
    );

    let mut lines: Vec<(Offset, String)> = vec![];
    let mut logger = FrameLogger::new();
    let analysis = {
        let mut print = |offset: Offset, insn: &VerifierInstruction, before: &Frame, after: &Frame| {
            let line = format!("{:>5}: {:?}  {} -> {}", offset.0, insn, before, after);
            lines.push((offset, line));
        };
        let mut analyzer = Analyzer::new(&method, &code, &handlers, &constants);
        analyzer.add_processor(&mut logger);
        analyzer.add_processor(&mut print);
        analyzer.analyze()?
    };

    lines.sort_by_key(|(offset, _)| *offset);
    for (_, line) in &lines {
        println!("{}", line);
    }
    println!(
        "max stack = {}, max locals = {}",
        analysis.max_stack(),
        analysis.max_locals()
    );

    if matches.get_flag("stack-map") {
        let stack_map_table = analysis.stack_map_table(&method.initial_frame());
        println!("stack map table ({} frames):", stack_map_table.len());
        for frame in &stack_map_table {
            println!("  {:?}", frame);
        }
    }

    log::info!("Logged {} instructions", logger.logged());
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, flag: &'static str) -> Result<&'a str, CliError> {
    matches
        .get_one::<String>(flag)
        .map(String::as_str)
        .ok_or_else(|| CliError::argument(flag, "missing"))
}

fn binary_name(flag: &'static str, name: &str) -> Result<BinaryName, CliError> {
    BinaryName::from_string(name.to_owned()).map_err(|msg| CliError::argument(flag, msg))
}

/// Parse a class name, or an array descriptor if the name starts with `[`
fn class_type(flag: &'static str, name: &str) -> Result<RefType<BinaryName>, CliError> {
    if name.starts_with('[') {
        Ok(RefType::parse(name)?)
    } else {
        Ok(RefType::Object(binary_name(flag, name)?))
    }
}

fn parse_hex(hex: &str) -> Result<Vec<u8>, CliError> {
    let digits: Vec<char> = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::argument("code", "odd number of hex digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let byte: String = pair.iter().collect();
            u8::from_str_radix(&byte, 16)
                .map_err(|_| CliError::argument("code", format!("'{}' is not a hex byte", byte)))
        })
        .collect()
}

/// Parse `CLASS.NAME:DESC` into its three parts
fn member<'a>(flag: &'static str, value: &'a str) -> Result<(&'a str, &'a str, &'a str), CliError> {
    let (qualified, descriptor) = value
        .split_once(':')
        .ok_or_else(|| CliError::argument(flag, format!("'{}' has no descriptor", value)))?;
    let (class, name) = qualified
        .rsplit_once('.')
        .ok_or_else(|| CliError::argument(flag, format!("'{}' has no class", value)))?;
    Ok((class, name, descriptor))
}

fn member_name(name: &str) -> Result<UnqualifiedName, CliError> {
    UnqualifiedName::from_string(name.to_owned()).map_err(|msg| CliError::argument("constant", msg))
}

fn parse_constant(arg: &str) -> Result<(u16, ConstantEntry), CliError> {
    let invalid = |what: &str| CliError::argument("constant", format!("{} in '{}'", what, arg));

    let (index, entry) = arg.split_once('=').ok_or_else(|| invalid("missing '='"))?;
    let index: u16 = index.trim().parse().map_err(|_| invalid("bad index"))?;
    let (kind, value) = entry.split_once(':').unwrap_or((entry, ""));

    let entry = match kind {
        "int" => ConstantEntry::Data(ConstantData::Integer(
            value.parse().map_err(|_| invalid("bad int"))?,
        )),
        "float" => ConstantEntry::Data(ConstantData::Float(
            value.parse().map_err(|_| invalid("bad float"))?,
        )),
        "long" => ConstantEntry::Data(ConstantData::Long(
            value.parse().map_err(|_| invalid("bad long"))?,
        )),
        "double" => ConstantEntry::Data(ConstantData::Double(
            value.parse().map_err(|_| invalid("bad double"))?,
        )),
        "string" => ConstantEntry::Data(ConstantData::String(value.to_owned())),
        "class" => ConstantEntry::Data(ConstantData::Class(class_type("constant", value)?)),
        "methodtype" => ConstantEntry::Data(ConstantData::MethodType(MethodDescriptor::parse(
            value,
        )?)),
        "methodhandle" => ConstantEntry::Data(ConstantData::MethodHandle),
        "field" => {
            let (class, name, descriptor) = member("constant", value)?;
            ConstantEntry::Field(FieldRef {
                class: binary_name("constant", class)?,
                name: member_name(name)?,
                descriptor: FieldType::parse(descriptor)?,
            })
        }
        "method" | "imethod" => {
            let (class, name, descriptor) = member("constant", value)?;
            ConstantEntry::Method(MethodRef {
                class: class_type("constant", class)?,
                name: member_name(name)?,
                descriptor: MethodDescriptor::parse(descriptor)?,
                is_interface: kind == "imethod",
            })
        }
        "indy" => {
            let (name, descriptor) = value
                .split_once(':')
                .ok_or_else(|| invalid("missing descriptor"))?;
            ConstantEntry::InvokeDynamic(InvokeDynamicRef {
                name: member_name(name)?,
                descriptor: MethodDescriptor::parse(descriptor)?,
            })
        }
        other => return Err(invalid(&format!("unknown kind '{}'", other))),
    };

    Ok((index, entry))
}

fn parse_handler(arg: &str) -> Result<ExceptionHandler, CliError> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [start, end, handler] | [start, end, handler, ""] => Ok(ExceptionHandler {
            start_pc: offset(start)?,
            end_pc: offset(end)?,
            handler_pc: offset(handler)?,
            catch_type: None,
        }),
        [start, end, handler, class] => Ok(ExceptionHandler {
            start_pc: offset(start)?,
            end_pc: offset(end)?,
            handler_pc: offset(handler)?,
            catch_type: Some(binary_name("handler", class)?),
        }),
        _ => Err(CliError::argument(
            "handler",
            format!("expected START,END,HANDLER[,CLASS] but got '{}'", arg),
        )),
    }
}

fn offset(part: &str) -> Result<Offset, CliError> {
    part.parse::<usize>()
        .map(Offset)
        .map_err(|_| CliError::argument("handler", format!("bad offset '{}'", part)))
}
