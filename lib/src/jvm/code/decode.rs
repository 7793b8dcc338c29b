use super::*;
use crate::jvm::{BaseType, Error};
use crate::util::Offset;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

/// Longest code array a method may have, in bytes
pub const MAX_CODE_LENGTH: usize = 65535;

/// Random-access view of the instructions in a method body
pub trait InstructionStream {
    /// Length of the code array, in bytes
    fn code_length(&self) -> usize;

    /// Does an instruction start at this offset?
    fn is_instruction_start(&self, offset: Offset) -> bool;

    /// Decode the instruction starting at an offset, along with its length in bytes
    fn decode(&self, offset: Offset) -> Result<(RawInstruction, usize), Error>;
}

/// Instruction stream backed by the raw bytes of a `Code` attribute
///
/// Instruction boundaries are computed once upfront, so invalid opcodes and truncated trailing
/// instructions are detected on construction. The subroutine instructions (`jsr`, `jsr_w`, and
/// `ret`) are only reported as unsupported when they actually get decoded.
#[derive(Debug, Clone)]
pub struct BytecodeStream<'a> {
    code: &'a [u8],
    instruction_starts: Vec<bool>,
}

impl<'a> BytecodeStream<'a> {
    pub fn new(code: &'a [u8]) -> Result<BytecodeStream<'a>, Error> {
        if code.len() > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLong(code.len()));
        }
        let mut instruction_starts = vec![false; code.len()];
        let mut offset = 0;
        while offset < code.len() {
            instruction_starts[offset] = true;
            offset += instruction_length(code, Offset(offset))?;
        }
        Ok(BytecodeStream {
            code,
            instruction_starts,
        })
    }

    /// Offsets of all instructions, in order
    pub fn instruction_offsets(&self) -> impl Iterator<Item = Offset> + '_ {
        self.instruction_starts
            .iter()
            .enumerate()
            .filter(|(_, is_start)| **is_start)
            .map(|(offset, _)| Offset(offset))
    }
}

impl<'a> InstructionStream for BytecodeStream<'a> {
    fn code_length(&self) -> usize {
        self.code.len()
    }

    fn is_instruction_start(&self, offset: Offset) -> bool {
        self.instruction_starts
            .get(offset.0)
            .copied()
            .unwrap_or(false)
    }

    fn decode(&self, offset: Offset) -> Result<(RawInstruction, usize), Error> {
        decode_instruction(self.code, offset)
    }
}

/// Cursor over the operands of a single instruction
struct Operands<'a> {
    cursor: Cursor<&'a [u8]>,
    start: Offset,
}

impl<'a> Operands<'a> {
    fn new(code: &'a [u8], start: Offset) -> Operands<'a> {
        let mut cursor = Cursor::new(code);
        cursor.set_position(start.0 as u64);
        Operands { cursor, start }
    }

    fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn truncated(&self) -> Error {
        Error::TruncatedInstruction(self.start)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        let start = self.start;
        self.cursor
            .read_u8()
            .map_err(|_| Error::TruncatedInstruction(start))
    }

    fn i8(&mut self) -> Result<i8, Error> {
        let start = self.start;
        self.cursor
            .read_i8()
            .map_err(|_| Error::TruncatedInstruction(start))
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let start = self.start;
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| Error::TruncatedInstruction(start))
    }

    fn i16(&mut self) -> Result<i16, Error> {
        let start = self.start;
        self.cursor
            .read_i16::<BigEndian>()
            .map_err(|_| Error::TruncatedInstruction(start))
    }

    fn i32(&mut self) -> Result<i32, Error> {
        let start = self.start;
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|_| Error::TruncatedInstruction(start))
    }

    /// Skip the 0-3 bytes of padding that align switch operands to a multiple of 4
    fn skip_padding(&mut self) -> Result<(), Error> {
        while self.position() % 4 != 0 {
            self.u8()?;
        }
        Ok(())
    }

    /// Turn a jump relative to the start of the instruction into an absolute offset
    fn jump(&self, relative: i32) -> Result<Offset, Error> {
        let target = self.start.0 as i64 + relative as i64;
        if target < 0 {
            Err(Error::InvalidJumpTarget {
                offset: self.start,
                target: Offset(0),
            })
        } else {
            Ok(Offset(target as usize))
        }
    }

    fn jump16(&mut self) -> Result<Offset, Error> {
        let relative = self.i16()?;
        self.jump(relative as i32)
    }

    fn jump32(&mut self) -> Result<Offset, Error> {
        let relative = self.i32()?;
        self.jump(relative)
    }

    /// Read the count of entries in a switch table
    fn count(&self, count: i64) -> Result<usize, Error> {
        if count < 0 {
            Err(self.truncated())
        } else {
            Ok(count as usize)
        }
    }
}

/// Length (in bytes) of the instruction starting at an offset
fn instruction_length(code: &[u8], offset: Offset) -> Result<usize, Error> {
    let mut operands = Operands::new(code, offset);
    let opcode = operands.u8()?;
    let length = match opcode {
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1
        | 0xc6 | 0xc7 => 3,
        0xc5 => 4,
        0xb9 | 0xba | 0xc8 | 0xc9 => 5,
        0xc4 => match operands.u8()? {
            0x84 => 6,
            _ => 4,
        },
        0xaa => {
            operands.skip_padding()?;
            let _default = operands.i32()?;
            let low = operands.i32()? as i64;
            let high = operands.i32()? as i64;
            let count = operands.count(high - low + 1)?;
            operands.position() - offset.0 + 4 * count
        }
        0xab => {
            operands.skip_padding()?;
            let _default = operands.i32()?;
            let npairs = operands.i32()?;
            let count = operands.count(npairs as i64)?;
            operands.position() - offset.0 + 8 * count
        }
        0x00..=0xc3 => 1,
        _ => return Err(Error::UnsupportedOpcode { offset, opcode }),
    };

    if offset.0 + length > code.len() {
        Err(Error::TruncatedInstruction(offset))
    } else {
        Ok(length)
    }
}

/// Decode the instruction starting at an offset
fn decode_instruction(code: &[u8], offset: Offset) -> Result<(RawInstruction, usize), Error> {
    use BranchInstruction as B;
    use Instruction as I;

    let mut ops = Operands::new(code, offset);
    let opcode = ops.u8()?;

    let insn: RawInstruction = match opcode {
        0x00 => AnyInstruction::Regular(I::Nop),
        0x01 => AnyInstruction::Regular(I::AConstNull),
        0x02 => AnyInstruction::Regular(I::IConstM1),
        0x03 => AnyInstruction::Regular(I::IConst0),
        0x04 => AnyInstruction::Regular(I::IConst1),
        0x05 => AnyInstruction::Regular(I::IConst2),
        0x06 => AnyInstruction::Regular(I::IConst3),
        0x07 => AnyInstruction::Regular(I::IConst4),
        0x08 => AnyInstruction::Regular(I::IConst5),
        0x09 => AnyInstruction::Regular(I::LConst0),
        0x0a => AnyInstruction::Regular(I::LConst1),
        0x0b => AnyInstruction::Regular(I::FConst0),
        0x0c => AnyInstruction::Regular(I::FConst1),
        0x0d => AnyInstruction::Regular(I::FConst2),
        0x0e => AnyInstruction::Regular(I::DConst0),
        0x0f => AnyInstruction::Regular(I::DConst1),
        0x10 => AnyInstruction::Regular(I::BiPush(ops.i8()?)),
        0x11 => AnyInstruction::Regular(I::SiPush(ops.i16()?)),
        0x12 => AnyInstruction::Regular(I::Ldc(ops.u8()? as u16)),
        0x13 => AnyInstruction::Regular(I::Ldc(ops.u16()?)),
        0x14 => AnyInstruction::Regular(I::Ldc2(ops.u16()?)),

        // Loads
        0x15 => AnyInstruction::Regular(I::ILoad(ops.u8()? as u16)),
        0x16 => AnyInstruction::Regular(I::LLoad(ops.u8()? as u16)),
        0x17 => AnyInstruction::Regular(I::FLoad(ops.u8()? as u16)),
        0x18 => AnyInstruction::Regular(I::DLoad(ops.u8()? as u16)),
        0x19 => AnyInstruction::Regular(I::ALoad(ops.u8()? as u16)),
        0x1a..=0x1d => AnyInstruction::Regular(I::ILoad((opcode - 0x1a) as u16)),
        0x1e..=0x21 => AnyInstruction::Regular(I::LLoad((opcode - 0x1e) as u16)),
        0x22..=0x25 => AnyInstruction::Regular(I::FLoad((opcode - 0x22) as u16)),
        0x26..=0x29 => AnyInstruction::Regular(I::DLoad((opcode - 0x26) as u16)),
        0x2a..=0x2d => AnyInstruction::Regular(I::ALoad((opcode - 0x2a) as u16)),
        0x2e => AnyInstruction::Regular(I::IALoad),
        0x2f => AnyInstruction::Regular(I::LALoad),
        0x30 => AnyInstruction::Regular(I::FALoad),
        0x31 => AnyInstruction::Regular(I::DALoad),
        0x32 => AnyInstruction::Regular(I::AALoad),
        0x33 => AnyInstruction::Regular(I::BALoad),
        0x34 => AnyInstruction::Regular(I::CALoad),
        0x35 => AnyInstruction::Regular(I::SALoad),

        // Stores
        0x36 => AnyInstruction::Regular(I::IStore(ops.u8()? as u16)),
        0x37 => AnyInstruction::Regular(I::LStore(ops.u8()? as u16)),
        0x38 => AnyInstruction::Regular(I::FStore(ops.u8()? as u16)),
        0x39 => AnyInstruction::Regular(I::DStore(ops.u8()? as u16)),
        0x3a => AnyInstruction::Regular(I::AStore(ops.u8()? as u16)),
        0x3b..=0x3e => AnyInstruction::Regular(I::IStore((opcode - 0x3b) as u16)),
        0x3f..=0x42 => AnyInstruction::Regular(I::LStore((opcode - 0x3f) as u16)),
        0x43..=0x46 => AnyInstruction::Regular(I::FStore((opcode - 0x43) as u16)),
        0x47..=0x4a => AnyInstruction::Regular(I::DStore((opcode - 0x47) as u16)),
        0x4b..=0x4e => AnyInstruction::Regular(I::AStore((opcode - 0x4b) as u16)),
        0x4f => AnyInstruction::Regular(I::IAStore),
        0x50 => AnyInstruction::Regular(I::LAStore),
        0x51 => AnyInstruction::Regular(I::FAStore),
        0x52 => AnyInstruction::Regular(I::DAStore),
        0x53 => AnyInstruction::Regular(I::AAStore),
        0x54 => AnyInstruction::Regular(I::BAStore),
        0x55 => AnyInstruction::Regular(I::CAStore),
        0x56 => AnyInstruction::Regular(I::SAStore),

        // Stack
        0x57 => AnyInstruction::Regular(I::Pop),
        0x58 => AnyInstruction::Regular(I::Pop2),
        0x59 => AnyInstruction::Regular(I::Dup),
        0x5a => AnyInstruction::Regular(I::DupX1),
        0x5b => AnyInstruction::Regular(I::DupX2),
        0x5c => AnyInstruction::Regular(I::Dup2),
        0x5d => AnyInstruction::Regular(I::Dup2X1),
        0x5e => AnyInstruction::Regular(I::Dup2X2),
        0x5f => AnyInstruction::Regular(I::Swap),

        // Math
        0x60 => AnyInstruction::Regular(I::IAdd),
        0x61 => AnyInstruction::Regular(I::LAdd),
        0x62 => AnyInstruction::Regular(I::FAdd),
        0x63 => AnyInstruction::Regular(I::DAdd),
        0x64 => AnyInstruction::Regular(I::ISub),
        0x65 => AnyInstruction::Regular(I::LSub),
        0x66 => AnyInstruction::Regular(I::FSub),
        0x67 => AnyInstruction::Regular(I::DSub),
        0x68 => AnyInstruction::Regular(I::IMul),
        0x69 => AnyInstruction::Regular(I::LMul),
        0x6a => AnyInstruction::Regular(I::FMul),
        0x6b => AnyInstruction::Regular(I::DMul),
        0x6c => AnyInstruction::Regular(I::IDiv),
        0x6d => AnyInstruction::Regular(I::LDiv),
        0x6e => AnyInstruction::Regular(I::FDiv),
        0x6f => AnyInstruction::Regular(I::DDiv),
        0x70 => AnyInstruction::Regular(I::IRem),
        0x71 => AnyInstruction::Regular(I::LRem),
        0x72 => AnyInstruction::Regular(I::FRem),
        0x73 => AnyInstruction::Regular(I::DRem),
        0x74 => AnyInstruction::Regular(I::INeg),
        0x75 => AnyInstruction::Regular(I::LNeg),
        0x76 => AnyInstruction::Regular(I::FNeg),
        0x77 => AnyInstruction::Regular(I::DNeg),
        0x78 => AnyInstruction::Regular(I::ISh(ShiftType::Left)),
        0x79 => AnyInstruction::Regular(I::LSh(ShiftType::Left)),
        0x7a => AnyInstruction::Regular(I::ISh(ShiftType::ArithmeticRight)),
        0x7b => AnyInstruction::Regular(I::LSh(ShiftType::ArithmeticRight)),
        0x7c => AnyInstruction::Regular(I::ISh(ShiftType::LogicalRight)),
        0x7d => AnyInstruction::Regular(I::LSh(ShiftType::LogicalRight)),
        0x7e => AnyInstruction::Regular(I::IAnd),
        0x7f => AnyInstruction::Regular(I::LAnd),
        0x80 => AnyInstruction::Regular(I::IOr),
        0x81 => AnyInstruction::Regular(I::LOr),
        0x82 => AnyInstruction::Regular(I::IXor),
        0x83 => AnyInstruction::Regular(I::LXor),
        0x84 => {
            let index = ops.u8()? as u16;
            let constant = ops.i8()? as i16;
            AnyInstruction::Regular(I::IInc(index, constant))
        }

        // Conversions
        0x85 => AnyInstruction::Regular(I::I2L),
        0x86 => AnyInstruction::Regular(I::I2F),
        0x87 => AnyInstruction::Regular(I::I2D),
        0x88 => AnyInstruction::Regular(I::L2I),
        0x89 => AnyInstruction::Regular(I::L2F),
        0x8a => AnyInstruction::Regular(I::L2D),
        0x8b => AnyInstruction::Regular(I::F2I),
        0x8c => AnyInstruction::Regular(I::F2L),
        0x8d => AnyInstruction::Regular(I::F2D),
        0x8e => AnyInstruction::Regular(I::D2I),
        0x8f => AnyInstruction::Regular(I::D2L),
        0x90 => AnyInstruction::Regular(I::D2F),
        0x91 => AnyInstruction::Regular(I::I2B),
        0x92 => AnyInstruction::Regular(I::I2C),
        0x93 => AnyInstruction::Regular(I::I2S),

        // Comparisons
        0x94 => AnyInstruction::Regular(I::LCmp),
        0x95 => AnyInstruction::Regular(I::FCmp(CompareMode::L)),
        0x96 => AnyInstruction::Regular(I::FCmp(CompareMode::G)),
        0x97 => AnyInstruction::Regular(I::DCmp(CompareMode::L)),
        0x98 => AnyInstruction::Regular(I::DCmp(CompareMode::G)),
        0x99..=0x9e => {
            let target = ops.jump16()?;
            let next = Offset(ops.position());
            AnyInstruction::Branch(B::If(ord_comparison(opcode - 0x99), target, next))
        }
        0x9f..=0xa4 => {
            let target = ops.jump16()?;
            let next = Offset(ops.position());
            AnyInstruction::Branch(B::IfICmp(ord_comparison(opcode - 0x9f), target, next))
        }
        0xa5 | 0xa6 => {
            let target = ops.jump16()?;
            let next = Offset(ops.position());
            AnyInstruction::Branch(B::IfACmp(eq_comparison(opcode - 0xa5), target, next))
        }

        // Control
        0xa7 => AnyInstruction::Branch(B::Goto(ops.jump16()?)),
        0xa8 | 0xa9 => return Err(Error::UnsupportedOpcode { offset, opcode }),
        0xaa => {
            ops.skip_padding()?;
            let default = ops.jump32()?;
            let low = ops.i32()?;
            let high = ops.i32()?;
            let count = ops.count(high as i64 - low as i64 + 1)?;
            let mut targets = vec![];
            for _ in 0..count {
                targets.push(ops.jump32()?);
            }
            AnyInstruction::Branch(B::TableSwitch {
                default,
                low,
                targets,
            })
        }
        0xab => {
            ops.skip_padding()?;
            let default = ops.jump32()?;
            let count = ops.i32()?;
            let count = ops.count(count as i64)?;
            let mut targets = vec![];
            for _ in 0..count {
                let key = ops.i32()?;
                targets.push((key, ops.jump32()?));
            }
            AnyInstruction::Branch(B::LookupSwitch { default, targets })
        }
        0xac => AnyInstruction::Branch(B::IReturn),
        0xad => AnyInstruction::Branch(B::LReturn),
        0xae => AnyInstruction::Branch(B::FReturn),
        0xaf => AnyInstruction::Branch(B::DReturn),
        0xb0 => AnyInstruction::Branch(B::AReturn),
        0xb1 => AnyInstruction::Branch(B::Return),

        // References
        0xb2 => AnyInstruction::Regular(I::GetStatic(ops.u16()?)),
        0xb3 => AnyInstruction::Regular(I::PutStatic(ops.u16()?)),
        0xb4 => AnyInstruction::Regular(I::GetField(ops.u16()?)),
        0xb5 => AnyInstruction::Regular(I::PutField(ops.u16()?)),
        0xb6 => AnyInstruction::Regular(I::Invoke(InvokeType::Virtual, ops.u16()?)),
        0xb7 => AnyInstruction::Regular(I::Invoke(InvokeType::Special, ops.u16()?)),
        0xb8 => AnyInstruction::Regular(I::Invoke(InvokeType::Static, ops.u16()?)),
        0xb9 => {
            let index = ops.u16()?;
            let count = ops.u8()?;
            let _zero = ops.u8()?;
            AnyInstruction::Regular(I::Invoke(InvokeType::Interface(count), index))
        }
        0xba => {
            let index = ops.u16()?;
            let _zero = ops.u16()?;
            AnyInstruction::Regular(I::InvokeDynamic(index))
        }
        0xbb => AnyInstruction::Regular(I::New(ops.u16()?)),
        0xbc => {
            let base_type = match ops.u8()? {
                4 => BaseType::Boolean,
                5 => BaseType::Char,
                6 => BaseType::Float,
                7 => BaseType::Double,
                8 => BaseType::Byte,
                9 => BaseType::Short,
                10 => BaseType::Int,
                11 => BaseType::Long,
                _ => return Err(ops.truncated()),
            };
            AnyInstruction::Regular(I::NewArray(base_type))
        }
        0xbd => AnyInstruction::Regular(I::ANewArray(ops.u16()?)),
        0xbe => AnyInstruction::Regular(I::ArrayLength),
        0xbf => AnyInstruction::Branch(B::AThrow),
        0xc0 => AnyInstruction::Regular(I::CheckCast(ops.u16()?)),
        0xc1 => AnyInstruction::Regular(I::InstanceOf(ops.u16()?)),
        0xc2 => AnyInstruction::Regular(I::MonitorEnter),
        0xc3 => AnyInstruction::Regular(I::MonitorExit),

        // Extended
        0xc4 => {
            let modified = ops.u8()?;
            let index = ops.u16()?;
            AnyInstruction::Regular(match modified {
                0x15 => I::ILoad(index),
                0x16 => I::LLoad(index),
                0x17 => I::FLoad(index),
                0x18 => I::DLoad(index),
                0x19 => I::ALoad(index),
                0x36 => I::IStore(index),
                0x37 => I::LStore(index),
                0x38 => I::FStore(index),
                0x39 => I::DStore(index),
                0x3a => I::AStore(index),
                0x84 => I::IInc(index, ops.i16()?),
                opcode => return Err(Error::UnsupportedOpcode { offset, opcode }),
            })
        }
        0xc5 => {
            let index = ops.u16()?;
            let dimensions = ops.u8()?;
            AnyInstruction::Regular(I::MultiANewArray(index, dimensions))
        }
        0xc6 | 0xc7 => {
            let target = ops.jump16()?;
            let next = Offset(ops.position());
            AnyInstruction::Branch(B::IfNull(eq_comparison(opcode - 0xc6), target, next))
        }
        0xc8 => AnyInstruction::Branch(B::GotoW(ops.jump32()?)),
        _ => return Err(Error::UnsupportedOpcode { offset, opcode }),
    };

    Ok((insn, ops.position() - offset.0))
}

/// Comparisons in opcode order (`eq`, `ne`, `lt`, `ge`, `gt`, `le`)
fn ord_comparison(index: u8) -> OrdComparison {
    match index {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

fn eq_comparison(index: u8) -> EqComparison {
    if index == 0 {
        EqComparison::EQ
    } else {
        EqComparison::NE
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode_all(code: &[u8]) -> Vec<(Offset, RawInstruction)> {
        let stream = BytecodeStream::new(code).unwrap();
        stream
            .instruction_offsets()
            .map(|offset| (offset, stream.decode(offset).unwrap().0))
            .collect()
    }

    #[test]
    fn short_forms_and_wide() {
        let code = [
            0x1b, // iload_1
            0xc4, 0x15, 0x01, 0x00, // wide iload 256
            0xc4, 0x84, 0x00, 0x02, 0xff, 0xfe, // wide iinc 2 -2
            0x84, 0x03, 0x7f, // iinc 3 127
            0x12, 0x07, // ldc #7
            0xb1, // return
        ];
        use Instruction::*;
        assert_eq!(
            decode_all(&code),
            vec![
                (Offset(0), AnyInstruction::Regular(ILoad(1))),
                (Offset(1), AnyInstruction::Regular(ILoad(256))),
                (Offset(5), AnyInstruction::Regular(IInc(2, -2))),
                (Offset(11), AnyInstruction::Regular(IInc(3, 127))),
                (Offset(14), AnyInstruction::Regular(Ldc(7))),
                (Offset(16), AnyInstruction::Branch(BranchInstruction::Return)),
            ]
        );
    }

    #[test]
    fn relative_jumps_become_absolute() {
        let code = [
            0x03, // 0: iconst_0
            0x99, 0x00, 0x06, // 1: ifeq +6
            0xa7, 0xff, 0xfc, // 4: goto -4
            0xb1, // 7: return
        ];
        let stream = BytecodeStream::new(&code).unwrap();
        assert_eq!(
            stream.decode(Offset(1)).unwrap(),
            (
                AnyInstruction::Branch(BranchInstruction::If(
                    OrdComparison::EQ,
                    Offset(7),
                    Offset(4)
                )),
                3
            )
        );
        assert_eq!(
            stream.decode(Offset(4)).unwrap(),
            (AnyInstruction::Branch(BranchInstruction::Goto(Offset(0))), 3)
        );
        assert!(stream.is_instruction_start(Offset(7)));
        assert!(!stream.is_instruction_start(Offset(5)));
        assert!(!stream.is_instruction_start(Offset(8)));
    }

    #[test]
    fn switch_padding() {
        let code = [
            0x03, // 0: iconst_0
            0xaa, // 1: tableswitch
            0x00, 0x00, // padding
            0x00, 0x00, 0x00, 0x23, // default: +35
            0x00, 0x00, 0x00, 0x01, // low: 1
            0x00, 0x00, 0x00, 0x02, // high: 2
            0x00, 0x00, 0x00, 0x23, // 1 => +35
            0x00, 0x00, 0x00, 0x17, // 2 => +23
            0xab, // 24: lookupswitch
            0x00, 0x00, 0x00, // padding
            0x00, 0x00, 0x00, 0x0c, // default: +12
            0x00, 0x00, 0x00, 0x00, // npairs: 0
            0xb1, // 36: return
        ];
        let stream = BytecodeStream::new(&code).unwrap();
        assert_eq!(
            stream.decode(Offset(1)).unwrap(),
            (
                AnyInstruction::Branch(BranchInstruction::TableSwitch {
                    default: Offset(36),
                    low: 1,
                    targets: vec![Offset(36), Offset(24)],
                }),
                23
            )
        );
        assert_eq!(
            stream.decode(Offset(24)).unwrap(),
            (
                AnyInstruction::Branch(BranchInstruction::LookupSwitch {
                    default: Offset(36),
                    targets: vec![],
                }),
                12
            )
        );
        assert!(stream.is_instruction_start(Offset(36)));
    }

    #[test]
    fn malformed_code() {
        assert!(matches!(
            BytecodeStream::new(&[0x11, 0x00]),
            Err(Error::TruncatedInstruction(Offset(0)))
        ));
        assert!(matches!(
            BytecodeStream::new(&vec![0x00; MAX_CODE_LENGTH + 1]),
            Err(Error::CodeTooLong(65536))
        ));
        assert!(BytecodeStream::new(&vec![0x00; MAX_CODE_LENGTH]).is_ok());
        assert!(matches!(
            BytecodeStream::new(&[0x00, 0xfe]),
            Err(Error::UnsupportedOpcode {
                offset: Offset(1),
                opcode: 0xfe
            })
        ));

        // Subroutines only fail once decoded
        let stream = BytecodeStream::new(&[0xa8, 0x00, 0x03, 0xb1]).unwrap();
        assert!(matches!(
            stream.decode(Offset(0)),
            Err(Error::UnsupportedOpcode {
                offset: Offset(0),
                opcode: 0xa8
            })
        ));
    }
}
