//! Effect of every instruction on the frame before it
//!
//! Operand kinds are checked for primitive operations (`iadd` wants two `int`s, `laload` wants a
//! `long[]` and an `int`, ...), but assignability between reference types is not: there is no
//! class hierarchy to check it against.

use super::*;
use crate::jvm::code::{
    AnyInstruction, BranchInstruction, Instruction, InvokeType, ResolvedInstruction,
    VerifierInstruction,
};
use crate::jvm::{BaseType, BinaryName, FieldType, RefType, VerifierErrorKind};
use crate::util::{Offset, Width};

impl Frame {
    /// Compute the frame after an instruction at the given offset
    pub fn after_instruction(
        &self,
        insn: &VerifierInstruction,
        offset: Offset,
    ) -> Result<Frame, VerifierErrorKind> {
        let mut frame = self.clone();
        match insn {
            AnyInstruction::Regular(insn) => execute_instruction(&mut frame, insn, offset)?,
            AnyInstruction::Branch(insn) => execute_branch_instruction(&mut frame, insn)?,
        }
        Ok(frame)
    }
}

fn execute_instruction(
    frame: &mut Frame,
    insn: &ResolvedInstruction,
    offset: Offset,
) -> Result<(), VerifierErrorKind> {
    use Instruction::*;
    use VerificationType::*;

    match insn {
        Nop => (),
        AConstNull => frame.push(Null),
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            frame.push(Integer);
        }
        LConst0 | LConst1 => frame.push(Long),
        FConst0 | FConst1 | FConst2 => frame.push(Float),
        DConst0 | DConst1 => frame.push(Double),
        BiPush(_) | SiPush(_) => frame.push(Integer),
        Ldc(constant) | Ldc2(constant) => frame.push(constant.verification_type()),

        ILoad(index) => frame.push(frame.load_expecting_type(*index, Integer)?),
        LLoad(index) => frame.push(frame.load_expecting_type(*index, Long)?),
        FLoad(index) => frame.push(frame.load_expecting_type(*index, Float)?),
        DLoad(index) => frame.push(frame.load_expecting_type(*index, Double)?),
        ALoad(index) => {
            let typ = frame.load(*index)?;
            if !typ.is_reference() {
                return Err(VerifierErrorKind::NotReference(typ));
            }
            frame.push(typ);
        }

        IALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Int])?;
            frame.push(Integer);
        }
        LALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Long])?;
            frame.push(Long);
        }
        FALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Float])?;
            frame.push(Float);
        }
        DALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Double])?;
            frame.push(Double);
        }
        AALoad => {
            frame.pop_expecting_type(Integer)?;
            let element_type = pop_reference_array(frame)?;
            frame.push(element_type);
        }
        BALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Byte, BaseType::Boolean])?;
            frame.push(Integer);
        }
        CALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Char])?;
            frame.push(Integer);
        }
        SALoad => {
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Short])?;
            frame.push(Integer);
        }

        IStore(index) => {
            let typ = frame.pop_expecting_type(Integer)?;
            frame.store(*index, typ);
        }
        LStore(index) => {
            let typ = frame.pop_expecting_type(Long)?;
            frame.store(*index, typ);
        }
        FStore(index) => {
            let typ = frame.pop_expecting_type(Float)?;
            frame.store(*index, typ);
        }
        DStore(index) => {
            let typ = frame.pop_expecting_type(Double)?;
            frame.store(*index, typ);
        }
        AStore(index) => {
            let typ = frame.pop_reference()?;
            frame.store(*index, typ);
        }

        IAStore => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Int])?;
        }
        LAStore => {
            frame.pop_expecting_type(Long)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Long])?;
        }
        FAStore => {
            frame.pop_expecting_type(Float)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Float])?;
        }
        DAStore => {
            frame.pop_expecting_type(Double)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Double])?;
        }
        AAStore => {
            frame.pop_reference()?;
            frame.pop_expecting_type(Integer)?;
            pop_reference_array(frame)?;
        }
        BAStore => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Byte, BaseType::Boolean])?;
        }
        CAStore => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Char])?;
        }
        SAStore => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Integer)?;
            pop_primitive_array(frame, &[BaseType::Short])?;
        }

        Pop => {
            frame.pop_expecting_width(1)?;
        }

        Pop2 => {
            let arg1 = frame.pop()?;
            match arg1.width() {
                // Form 1
                1 => {
                    frame.pop_expecting_width(1)?;
                }

                // Form 2
                2 => (),

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup => {
            let arg1 = frame.pop_expecting_width(1)?;
            frame.push(arg1.clone());
            frame.push(arg1);
        }

        DupX1 => {
            let arg1 = frame.pop_expecting_width(1)?;
            let arg2 = frame.pop_expecting_width(1)?;
            frame.push(arg1.clone());
            frame.push(arg2);
            frame.push(arg1);
        }

        DupX2 => {
            let arg1 = frame.pop_expecting_width(1)?;
            let arg2 = frame.pop()?;
            match arg2.width() {
                // Form 1
                1 => {
                    let arg3 = frame.pop_expecting_width(1)?;
                    frame.push(arg1.clone());
                    frame.push(arg3);
                    frame.push(arg2);
                    frame.push(arg1);
                }

                // Form 2
                2 => {
                    frame.push(arg1.clone());
                    frame.push(arg2);
                    frame.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2 => {
            let arg1 = frame.pop()?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = frame.pop_expecting_width(1)?;
                    frame.push(arg2.clone());
                    frame.push(arg1.clone());
                    frame.push(arg2);
                    frame.push(arg1);
                }

                // Form 2
                2 => {
                    frame.push(arg1.clone());
                    frame.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X1 => {
            let arg1 = frame.pop()?;
            let arg2 = frame.pop_expecting_width(1)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg3 = frame.pop_expecting_width(1)?;
                    frame.push(arg2.clone());
                    frame.push(arg1.clone());
                    frame.push(arg3);
                    frame.push(arg2);
                    frame.push(arg1);
                }

                // Form 2
                2 => {
                    frame.push(arg1.clone());
                    frame.push(arg2);
                    frame.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X2 => {
            let arg1 = frame.pop()?;
            match arg1.width() {
                1 => {
                    let arg2 = frame.pop_expecting_width(1)?;
                    let arg3 = frame.pop()?;
                    match arg3.width() {
                        // Form 1
                        1 => {
                            let arg4 = frame.pop_expecting_width(1)?;
                            frame.push(arg2.clone());
                            frame.push(arg1.clone());
                            frame.push(arg4);
                            frame.push(arg3);
                            frame.push(arg2);
                            frame.push(arg1);
                        }

                        // Form 3
                        2 => {
                            frame.push(arg2.clone());
                            frame.push(arg1.clone());
                            frame.push(arg3);
                            frame.push(arg2);
                            frame.push(arg1);
                        }

                        other => return Err(VerifierErrorKind::InvalidWidth(other)),
                    }
                }

                2 => {
                    let arg2 = frame.pop()?;
                    match arg2.width() {
                        // Form 2
                        1 => {
                            let arg3 = frame.pop_expecting_width(1)?;
                            frame.push(arg1.clone());
                            frame.push(arg3);
                            frame.push(arg2);
                            frame.push(arg1);
                        }

                        // Form 4
                        2 => {
                            frame.push(arg1.clone());
                            frame.push(arg2);
                            frame.push(arg1);
                        }

                        other => return Err(VerifierErrorKind::InvalidWidth(other)),
                    }
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Swap => {
            let arg1 = frame.pop_expecting_width(1)?;
            let arg2 = frame.pop_expecting_width(1)?;
            frame.push(arg1);
            frame.push(arg2);
        }

        IAdd | ISub | IDiv | IMul | IRem | IAnd | IOr | IXor | ISh(_) => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Integer)?;
            frame.push(Integer);
        }

        LAdd | LSub | LDiv | LMul | LRem | LAnd | LOr | LXor => {
            frame.pop_expecting_type(Long)?;
            frame.pop_expecting_type(Long)?;
            frame.push(Long);
        }

        FAdd | FSub | FDiv | FMul | FRem => {
            frame.pop_expecting_type(Float)?;
            frame.pop_expecting_type(Float)?;
            frame.push(Float);
        }

        DAdd | DSub | DDiv | DMul | DRem => {
            frame.pop_expecting_type(Double)?;
            frame.pop_expecting_type(Double)?;
            frame.push(Double);
        }

        INeg | I2B | I2C | I2S => {
            frame.pop_expecting_type(Integer)?;
            frame.push(Integer);
        }

        LNeg => {
            frame.pop_expecting_type(Long)?;
            frame.push(Long);
        }

        FNeg => {
            frame.pop_expecting_type(Float)?;
            frame.push(Float);
        }

        DNeg => {
            frame.pop_expecting_type(Double)?;
            frame.push(Double);
        }

        // Shift distance is an `int`, even for `long` shifts
        LSh(_) => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Long)?;
            frame.push(Long);
        }

        IInc(index, _) => {
            frame.load_expecting_type(*index, Integer)?;
        }

        I2L => {
            frame.pop_expecting_type(Integer)?;
            frame.push(Long);
        }
        I2F => {
            frame.pop_expecting_type(Integer)?;
            frame.push(Float);
        }
        I2D => {
            frame.pop_expecting_type(Integer)?;
            frame.push(Double);
        }

        L2I => {
            frame.pop_expecting_type(Long)?;
            frame.push(Integer);
        }
        L2F => {
            frame.pop_expecting_type(Long)?;
            frame.push(Float);
        }
        L2D => {
            frame.pop_expecting_type(Long)?;
            frame.push(Double);
        }

        F2I => {
            frame.pop_expecting_type(Float)?;
            frame.push(Integer);
        }
        F2L => {
            frame.pop_expecting_type(Float)?;
            frame.push(Long);
        }
        F2D => {
            frame.pop_expecting_type(Float)?;
            frame.push(Double);
        }

        D2I => {
            frame.pop_expecting_type(Double)?;
            frame.push(Integer);
        }
        D2L => {
            frame.pop_expecting_type(Double)?;
            frame.push(Long);
        }
        D2F => {
            frame.pop_expecting_type(Double)?;
            frame.push(Float);
        }

        LCmp => {
            frame.pop_expecting_type(Long)?;
            frame.pop_expecting_type(Long)?;
            frame.push(Integer);
        }
        FCmp(_) => {
            frame.pop_expecting_type(Float)?;
            frame.pop_expecting_type(Float)?;
            frame.push(Integer);
        }
        DCmp(_) => {
            frame.pop_expecting_type(Double)?;
            frame.pop_expecting_type(Double)?;
            frame.push(Integer);
        }

        GetStatic(field) => {
            frame.push(VerificationType::from(field.descriptor.clone()));
        }
        PutStatic(field) => {
            pop_field_type(frame, &field.descriptor)?;
        }
        GetField(field) => {
            frame.pop_reference()?;
            frame.push(VerificationType::from(field.descriptor.clone()));
        }
        PutField(field) => {
            pop_field_type(frame, &field.descriptor)?;
            frame.pop_reference()?;
        }

        Invoke(invoke_type, method) => {
            let desc = &method.descriptor;

            // Arguments are popped last to first
            for parameter in desc.parameters.iter().rev() {
                pop_field_type(frame, parameter)?;
            }

            match invoke_type {
                InvokeType::Special if method.is_init() => {
                    let receiver = frame.pop()?;
                    frame.reference_initialized(&receiver)?;
                }
                InvokeType::Special | InvokeType::Virtual | InvokeType::Interface(_) => {
                    frame.pop_reference()?;
                }
                InvokeType::Static => (),
            }

            if let Some(return_type) = &desc.return_type {
                frame.push(VerificationType::from(return_type.clone()));
            }
        }

        InvokeDynamic(invoke_dynamic) => {
            let desc = &invoke_dynamic.descriptor;
            for parameter in desc.parameters.iter().rev() {
                pop_field_type(frame, parameter)?;
            }
            if let Some(return_type) = &desc.return_type {
                frame.push(VerificationType::from(return_type.clone()));
            }
        }

        New(ref_type) => {
            if ref_type.is_array() {
                return Err(VerifierErrorKind::InvalidType {
                    expected: VerificationType::object(BinaryName::OBJECT),
                    found: Object(ref_type.clone()),
                });
            }
            frame.push(Uninitialized(UninitializedRefType {
                verification_type: ref_type.clone(),
                created_at: offset,
            }));
        }
        NewArray(base_type) => {
            frame.pop_expecting_type(Integer)?;
            frame.push(Object(RefType::array(FieldType::Base(*base_type))));
        }
        ANewArray(ref_type) => {
            frame.pop_expecting_type(Integer)?;
            frame.push(Object(RefType::array(FieldType::Ref(ref_type.clone()))));
        }
        MultiANewArray(ref_type, dimensions) => {
            for _ in 0..*dimensions {
                frame.pop_expecting_type(Integer)?;
            }
            frame.push(Object(ref_type.clone()));
        }
        ArrayLength => {
            match frame.pop()? {
                Null => (),
                Object(ref_type) if ref_type.is_array() => (),
                other => return Err(VerifierErrorKind::NotArrayType(other)),
            }
            frame.push(Integer);
        }

        CheckCast(ref_type) => {
            frame.pop_reference()?;
            frame.push(Object(ref_type.clone()));
        }
        InstanceOf(_) => {
            frame.pop_reference()?;
            frame.push(Integer);
        }

        MonitorEnter | MonitorExit => {
            frame.pop_reference()?;
        }
    }

    Ok(())
}

fn execute_branch_instruction(
    frame: &mut Frame,
    insn: &BranchInstruction,
) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;
    use VerificationType::*;

    match insn {
        If(_, _, _) => {
            frame.pop_expecting_type(Integer)?;
        }
        IfICmp(_, _, _) => {
            frame.pop_expecting_type(Integer)?;
            frame.pop_expecting_type(Integer)?;
        }
        IfACmp(_, _, _) => {
            frame.pop_reference()?;
            frame.pop_reference()?;
        }
        IfNull(_, _, _) => {
            frame.pop_reference()?;
        }
        Goto(_) | GotoW(_) => (),
        TableSwitch { .. } | LookupSwitch { .. } => {
            frame.pop_expecting_type(Integer)?;
        }
        IReturn => {
            frame.pop_expecting_type(Integer)?;
        }
        LReturn => {
            frame.pop_expecting_type(Long)?;
        }
        FReturn => {
            frame.pop_expecting_type(Float)?;
        }
        DReturn => {
            frame.pop_expecting_type(Double)?;
        }
        AReturn => {
            frame.pop_reference()?;
        }
        Return => (),
        AThrow => {
            frame.pop_reference()?;
            frame.clear_stack();
        }
    }

    Ok(())
}

/// Pop a value that could be stored in a field (or passed as an argument) of the given type
fn pop_field_type(
    frame: &mut Frame,
    field_type: &FieldType<BinaryName>,
) -> Result<VerificationType, VerifierErrorKind> {
    match field_type {
        FieldType::Base(_) => frame.pop_expecting_type(VerificationType::from(field_type.clone())),
        FieldType::Ref(_) => frame.pop_reference(),
    }
}

/// Pop an array whose elements are one of the given primitive types (or `null`)
fn pop_primitive_array(
    frame: &mut Frame,
    element_types: &[BaseType],
) -> Result<(), VerifierErrorKind> {
    match frame.pop()? {
        VerificationType::Null => Ok(()),
        VerificationType::Object(RefType::PrimitiveArray(arr))
            if arr.additional_dimensions == 0 && element_types.contains(&arr.element_type) =>
        {
            Ok(())
        }
        found @ VerificationType::Object(RefType::PrimitiveArray(_) | RefType::ObjectArray(_)) => {
            let expected = element_types
                .first()
                .map(|base_type| RefType::array(FieldType::Base(*base_type)))
                .map(VerificationType::Object)
                .unwrap_or(VerificationType::Null);
            Err(VerifierErrorKind::InvalidType { expected, found })
        }
        other => Err(VerifierErrorKind::NotArrayType(other)),
    }
}

/// Pop an array of references (or `null`) and return the type of its elements
fn pop_reference_array(frame: &mut Frame) -> Result<VerificationType, VerifierErrorKind> {
    match frame.pop()? {
        VerificationType::Null => Ok(VerificationType::Null),
        VerificationType::Object(array_type) => match array_type.component_type() {
            Some(component @ FieldType::Ref(_)) => Ok(VerificationType::from(component)),
            _ => Err(VerifierErrorKind::NotArrayType(VerificationType::Object(
                array_type,
            ))),
        },
        other => Err(VerifierErrorKind::NotArrayType(other)),
    }
}
