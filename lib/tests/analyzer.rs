use classflow::jvm::code::{
    BytecodeStream, ConstantData, ConstantEntry, ConstantTable, ExceptionHandler, MethodRef,
    VerifierInstruction,
};
use classflow::jvm::verifier::{
    Analysis, Analyzer, Frame, MethodContext, OffsetFlags, StackMapFrame, UninitializedRefType,
    VerificationType,
};
use classflow::jvm::*;
use classflow::util::Offset;
use VerificationType::*;

fn class(name: &str) -> BinaryName {
    BinaryName::from_string(name.to_owned()).unwrap()
}

fn method(name: &str, descriptor: &str, is_static: bool) -> MethodContext {
    MethodContext {
        owner: class("me/Bar"),
        name: UnqualifiedName::from_string(name.to_owned()).unwrap(),
        descriptor: MethodDescriptor::parse(descriptor).unwrap(),
        is_static,
    }
}

fn analyze(
    method: &MethodContext,
    bytecode: &[u8],
    handlers: &[ExceptionHandler],
    constants: &ConstantTable,
) -> Result<Analysis, Error> {
    let code = BytecodeStream::new(bytecode)?;
    Analyzer::new(method, &code, handlers, constants).analyze()
}

fn stack(frame: &Frame) -> Vec<VerificationType> {
    frame.stack.iter().map(|(_, typ)| typ.clone()).collect()
}

/// Every populated frame keeps category-2 locals paired with `Top`, and never has `Top` on the stack
fn assert_well_formed(analysis: &Analysis) {
    for offset in analysis.evaluated_offsets() {
        for frame in [analysis.frame_before(offset), analysis.frame_after(offset)] {
            let frame = frame.unwrap();
            for (i, local) in frame.locals.iter().enumerate() {
                if matches!(local, Some(typ) if typ.is_category2()) {
                    assert_eq!(frame.locals.get(i + 1), Some(&Some(Top)), "at {:?}", offset);
                }
            }
            assert!(stack(frame).iter().all(|typ| *typ != Top));
        }
    }
}

#[test]
fn constant_and_return() {
    let m = method("f", "()I", true);
    let analysis = analyze(&m, &[0x03, 0xac], &[], &ConstantTable::new()).unwrap();

    let before = analysis.frame_before(Offset(0)).unwrap();
    assert!(before.locals.is_empty());
    assert!(before.stack.is_empty());
    assert_eq!(stack(analysis.frame_after(Offset(0)).unwrap()), vec![Integer]);
    assert!(analysis.frame_after(Offset(1)).unwrap().stack.is_empty());
    assert!(analysis
        .flags(Offset(1))
        .contains(OffsetFlags::BLOCK_EXIT));
    assert_eq!(analysis.order(), &[Offset(0), Offset(1)]);
    assert_well_formed(&analysis);
}

#[test]
fn object_construction() {
    let foo = RefType::Object(class("me/Foo"));
    let mut constants = ConstantTable::new();
    constants.insert(1, ConstantEntry::Data(ConstantData::Class(foo.clone())));
    constants.insert(
        2,
        ConstantEntry::Method(MethodRef {
            class: foo.clone(),
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor::parse("()V").unwrap(),
            is_interface: false,
        }),
    );

    let m = method("run", "()V", false);
    let bytecode = [
        0xbb, 0x00, 0x01, // 0: new me/Foo
        0x59, // 3: dup
        0xb7, 0x00, 0x02, // 4: invokespecial me/Foo.<init>()V
        0x4c, // 7: astore_1
        0xb1, // 8: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &constants).unwrap();

    let uninit = Uninitialized(UninitializedRefType {
        verification_type: foo.clone(),
        created_at: Offset(0),
    });
    let initialized = Object(foo);
    let this = VerificationType::object(class("me/Bar"));

    assert_eq!(stack(analysis.frame_after(Offset(0)).unwrap()), vec![uninit.clone()]);
    assert_eq!(
        stack(analysis.frame_after(Offset(3)).unwrap()),
        vec![uninit.clone(), uninit]
    );
    assert_eq!(
        stack(analysis.frame_after(Offset(4)).unwrap()),
        vec![initialized.clone()]
    );

    let after_store = analysis.frame_after(Offset(7)).unwrap();
    assert!(after_store.stack.is_empty());
    assert_eq!(after_store.locals, vec![Some(this), Some(initialized)]);
    assert_well_formed(&analysis);
}

#[test]
fn constructor_initializes_this() {
    let mut constants = ConstantTable::new();
    constants.insert(
        1,
        ConstantEntry::Method(MethodRef {
            class: RefType::Object(BinaryName::OBJECT),
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor::parse("()V").unwrap(),
            is_interface: false,
        }),
    );

    let m = method("<init>", "()V", false);
    let bytecode = [
        0x2a, // 0: aload_0
        0xb7, 0x00, 0x01, // 1: invokespecial java/lang/Object.<init>()V
        0xb1, // 4: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &constants).unwrap();

    let bar = RefType::Object(class("me/Bar"));
    assert_eq!(
        analysis.frame_before(Offset(0)).unwrap().locals,
        vec![Some(UninitializedThis(bar.clone()))]
    );
    assert_eq!(
        analysis.frame_after(Offset(1)).unwrap().locals,
        vec![Some(Object(bar))]
    );
}

#[test]
fn conditional_branch_successors() {
    let m = method("f", "(II)V", true);
    let bytecode = [
        0x1a, // 0: iload_0
        0x1b, // 1: iload_1
        0x9f, 0x00, 0x06, // 2: if_icmpeq 8
        0x03, // 5: iconst_0
        0x57, // 6: pop
        0xb1, // 7: return
        0xb1, // 8: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();

    assert_eq!(
        stack(analysis.frame_before(Offset(2)).unwrap()),
        vec![Integer, Integer]
    );
    let after = analysis.frame_after(Offset(2)).unwrap();
    for successor in [Offset(5), Offset(8)] {
        let frame = analysis.frame_before(successor).unwrap();
        assert!(frame.stack.is_empty());
        assert_eq!(frame.locals, after.locals);
        assert!(analysis.flags(successor).contains(OffsetFlags::BLOCK_ENTRY));
    }
    assert!(analysis.flags(Offset(2)).contains(OffsetFlags::BLOCK_EXIT));

    assert_eq!(
        analysis.stack_map_table(&m.initial_frame()),
        vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 5 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 2 },
        ]
    );
    assert_well_formed(&analysis);
}

#[test]
fn loop_back_to_method_start() {
    let m = method("f", "(I)V", true);
    let bytecode = [
        0x1a, // 0: iload_0
        0x99, 0x00, 0x06, // 1: ifeq 7
        0xa7, 0xff, 0xfc, // 4: goto 0
        0xb1, // 7: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();

    assert!(analysis.flags(Offset(0)).contains(OffsetFlags::JUMP_TARGET));
    assert!(!analysis.flags(Offset(4)).contains(OffsetFlags::JUMP_TARGET));
    assert_eq!(
        analysis.stack_map_table(&m.initial_frame()),
        vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 0 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 3 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 2 },
        ]
    );
    assert_well_formed(&analysis);
}

#[test]
fn table_switch_targets() {
    let m = method("f", "(I)V", true);
    let bytecode = [
        0x1a, // 0: iload_0
        0xaa, 0x00, 0x00, // 1: tableswitch (padded)
        0x00, 0x00, 0x00, 0x17, //    default: 24
        0x00, 0x00, 0x00, 0x00, //    low: 0
        0x00, 0x00, 0x00, 0x01, //    high: 1
        0x00, 0x00, 0x00, 0x19, //    0: 26
        0x00, 0x00, 0x00, 0x1b, //    1: 28
        0x00, // 24: nop
        0xb1, // 25: return
        0x00, // 26: nop
        0xb1, // 27: return
        0x00, // 28: nop
        0xb1, // 29: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();

    assert_eq!(stack(analysis.frame_before(Offset(1)).unwrap()), vec![Integer]);
    assert!(analysis.frame_after(Offset(1)).unwrap().stack.is_empty());
    assert!(analysis.flags(Offset(1)).contains(OffsetFlags::BLOCK_EXIT));
    for target in [Offset(24), Offset(26), Offset(28)] {
        assert!(analysis
            .flags(target)
            .contains(OffsetFlags::BLOCK_ENTRY | OffsetFlags::JUMP_TARGET));
        let frame = analysis.frame_before(target).unwrap();
        assert!(frame.stack.is_empty());
        assert_eq!(frame.locals, vec![Some(Integer)]);
    }

    // Cases are pushed after the default, so they are evaluated first
    assert_eq!(
        analysis.order(),
        &[
            Offset(0),
            Offset(1),
            Offset(28),
            Offset(29),
            Offset(26),
            Offset(27),
            Offset(24),
            Offset(25)
        ]
    );
    assert_eq!(
        analysis.stack_map_table(&m.initial_frame()),
        vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 24 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 1 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 1 },
        ]
    );
    assert_well_formed(&analysis);
}

#[test]
fn lookup_switch_targets() {
    let m = method("f", "(I)V", true);
    let bytecode = [
        0x1a, // 0: iload_0
        0xab, 0x00, 0x00, // 1: lookupswitch (padded)
        0x00, 0x00, 0x00, 0x13, //    default: 20
        0x00, 0x00, 0x00, 0x01, //    npairs: 1
        0x00, 0x00, 0x00, 0x05, //    5: 21
        0x00, 0x00, 0x00, 0x14,
        0xb1, // 20: return
        0xb1, // 21: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();

    assert!(analysis.frame_after(Offset(1)).unwrap().stack.is_empty());
    for target in [Offset(20), Offset(21)] {
        assert!(analysis.flags(target).contains(OffsetFlags::JUMP_TARGET));
        assert!(analysis.frame_before(target).unwrap().stack.is_empty());
    }
    assert_eq!(analysis.order().len(), 4);
}

#[test]
fn category2_locals() {
    let m = method("f", "()V", true);
    let bytecode = [
        0x09, // 0: lconst_0
        0x41, // 1: lstore_2
        0x20, // 2: lload_2
        0x58, // 3: pop2
        0xb1, // 4: return
    ];
    let analysis = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();

    assert_eq!(
        analysis.frame_after(Offset(1)).unwrap().locals,
        vec![None, None, Some(Long), Some(Top)]
    );
    assert_eq!(stack(analysis.frame_after(Offset(2)).unwrap()), vec![Long]);
    assert_eq!(analysis.max_stack(), 2);
    assert_eq!(analysis.max_locals(), 4);
    assert_well_formed(&analysis);

    let bytecode = [
        0x09, // 0: lconst_0
        0x41, // 1: lstore_2
        0x1d, // 2: iload_3
        0x57, // 3: pop
        0xb1, // 4: return
    ];
    let err = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::InvariantViolated {
            offset: Offset(2),
            kind: VerifierErrorKind::InvalidLocal(3),
            ..
        }
    ));
}

#[test]
fn exception_handler_seeding() {
    let m = method("f", "(I)V", true);
    let bytecode = [
        0x04, // 0: iconst_1
        0x3c, // 1: istore_1
        0x1a, // 2: iload_0
        0x57, // 3: pop
        0xb1, // 4: return
        0x4c, // 5: astore_1
        0xb1, // 6: return
    ];
    let handler = ExceptionHandler {
        start_pc: Offset(0),
        end_pc: Offset(4),
        handler_pc: Offset(5),
        catch_type: Some(class("me/MyException")),
    };
    let analysis = analyze(&m, &bytecode, &[handler], &ConstantTable::new()).unwrap();

    let entry = analysis.frame_before(Offset(0)).unwrap();
    let handler_frame = analysis.frame_before(Offset(5)).unwrap();
    assert_eq!(handler_frame.locals, entry.locals);
    assert_eq!(
        stack(handler_frame),
        vec![VerificationType::object(class("me/MyException"))]
    );
    assert_eq!(
        analysis.flags(Offset(5)),
        OffsetFlags::BLOCK_ENTRY | OffsetFlags::EXCEPTION_HANDLER
    );
    assert_eq!(
        analysis.stack_map_table(&m.initial_frame()),
        vec![StackMapFrame::SameLocalsOneStack {
            offset_delta: 5,
            stack: VerificationType::object(class("me/MyException")),
        }]
    );
}

#[test]
fn nested_handlers_are_deferred() {
    let m = method("f", "()V", true);
    let bytecode = [
        0x03, // 0: iconst_0
        0x57, // 1: pop
        0xb1, // 2: return
        0x4b, // 3: astore_0
        0x01, // 4: aconst_null
        0xbf, // 5: athrow
        0x4b, // 6: astore_0
        0xb1, // 7: return
    ];
    let inner = ExceptionHandler {
        start_pc: Offset(3),
        end_pc: Offset(6),
        handler_pc: Offset(6),
        catch_type: None,
    };
    let outer = ExceptionHandler {
        start_pc: Offset(0),
        end_pc: Offset(3),
        handler_pc: Offset(3),
        catch_type: None,
    };

    // The first handler protects code only reachable through the second
    let analysis = analyze(&m, &bytecode, &[inner, outer], &ConstantTable::new()).unwrap();
    let throwable = VerificationType::object(BinaryName::THROWABLE);
    assert_eq!(stack(analysis.frame_before(Offset(3)).unwrap()), vec![throwable.clone()]);
    assert_eq!(stack(analysis.frame_before(Offset(6)).unwrap()), vec![throwable.clone()]);
    assert!(analysis.frame_after(Offset(5)).unwrap().stack.is_empty());
    assert_eq!(
        analysis.frame_after(Offset(6)).unwrap().locals,
        vec![Some(throwable)]
    );
}

#[test]
fn unreachable_protected_range() {
    let m = method("f", "()V", true);
    let bytecode = [
        0xb1, // 0: return
        0x00, // 1: nop
        0xb1, // 2: return
    ];
    let handler = ExceptionHandler {
        start_pc: Offset(1),
        end_pc: Offset(2),
        handler_pc: Offset(2),
        catch_type: None,
    };
    assert!(matches!(
        analyze(&m, &bytecode, &[handler], &ConstantTable::new()),
        Err(Error::MissingFrame(Offset(1)))
    ));
}

#[test]
fn deterministic() {
    let m = method("f", "(IJ)J", true);
    let bytecode = [
        0x1a, // 0: iload_0
        0x99, 0x00, 0x06, // 1: ifeq 7
        0x1f, // 4: lload_1
        0x0a, // 5: lconst_1
        0x61, // 6: ladd
        0x1f, // 7: lload_1
        0xad, // 8: lreturn
    ];

    // Offset 7 is reached both by fallthrough (with a long on the stack) and by the jump
    let first = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();
    let second = analyze(&m, &bytecode, &[], &ConstantTable::new()).unwrap();

    assert_eq!(first.order(), second.order());
    for offset in first.evaluated_offsets() {
        assert_eq!(first.frame_before(offset), second.frame_before(offset));
        assert_eq!(first.frame_after(offset), second.frame_after(offset));
    }
    assert_well_formed(&first);
}

#[test]
fn processors_replay_in_evaluation_order() {
    let m = method("f", "(II)V", true);
    let bytecode = [
        0x1a, // 0: iload_0
        0x1b, // 1: iload_1
        0x9f, 0x00, 0x06, // 2: if_icmpeq 8
        0x03, // 5: iconst_0
        0x57, // 6: pop
        0xb1, // 7: return
        0xb1, // 8: return
    ];
    let code = BytecodeStream::new(&bytecode).unwrap();
    let constants = ConstantTable::new();

    let mut first_seen: Vec<Offset> = vec![];
    let mut second_seen: Vec<(Offset, usize, usize)> = vec![];
    let analysis = {
        let mut first = |offset: Offset, _: &VerifierInstruction, _: &Frame, _: &Frame| {
            first_seen.push(offset);
        };
        let mut second = |offset: Offset, _: &VerifierInstruction, before: &Frame, after: &Frame| {
            second_seen.push((offset, before.stack_size(), after.stack_size()));
        };
        let mut analyzer = Analyzer::new(&m, &code, &[], &constants);
        analyzer.add_processor(&mut first);
        analyzer.add_processor(&mut second);
        analyzer.analyze().unwrap()
    };

    assert_eq!(first_seen, analysis.order());
    assert_eq!(
        second_seen,
        vec![
            (Offset(0), 0, 1),
            (Offset(1), 1, 2),
            (Offset(2), 2, 0),
            (Offset(5), 0, 1),
            (Offset(6), 1, 0),
            (Offset(7), 0, 0),
            (Offset(8), 0, 0),
        ]
    );
}
