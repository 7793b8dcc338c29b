//! Decoded form of the JVM instruction set
//!
//! A few liberties are taken relative to the opcode table, all of which shrink the number of
//! cases the verifier has to consider:
//!
//!   - `wide` is folded into the load, store, and `iinc` instruction it prefixes
//!   - short forms with implicit operands (eg. `aload_2`) decode to the general variant
//!   - families of branches that only differ in the comparison share one variant
//!   - branch targets are stored as absolute code offsets
//!
//! `jsr`, `jsr_w`, and `ret` have no representation since they get rejected during decoding.

use super::*;
use crate::jvm::{BaseType, BinaryName, RefType, VerifierErrorKind};
use crate::util::Offset;

/// Instruction which always continues at the next instruction (if it completes normally)
///
/// The type parameters are the operands which point into the constant pool.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction<Class, Constant, Field, Method, IndyMethod> {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // `ldc` or `ldc_w`
    Ldc2(Constant), // `ldc2_w`
    ILoad(u16), // any `iload` form, including `iload_<n>` and `wide`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // any `istore` form, including `istore_<n>` and `wide`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType),
    LSh(ShiftType),
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16),
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode),
    DCmp(CompareMode),
    GetStatic(Field),
    PutStatic(Field),
    GetField(Field),
    PutField(Field),
    Invoke(InvokeType, Method),
    InvokeDynamic(IndyMethod),
    New(Class),
    NewArray(BaseType),
    ANewArray(Class),
    MultiANewArray(Class, u8),
    ArrayLength,
    CheckCast(Class),
    InstanceOf(Class),
    MonitorEnter,
    MonitorExit,
}

/// Rebuild a straight-line instruction with different constant pool operand types
///
/// Only the arms for variants with constant pool operands are written out by the caller.
macro_rules! map_pool_operands {
    (
        $insn:expr;
        plain: [$($plain:ident),* $(,)?];
        copied: [$($copied:ident($($field:ident),+)),* $(,)?];
        $($pat:pat => $body:expr,)*
    ) => {
        match $insn {
            $(Instruction::$plain => Instruction::$plain,)*
            $(Instruction::$copied($($field),+) => Instruction::$copied($(*$field),+),)*
            $($pat => $body,)*
        }
    };
}

impl<Class, Constant, Field, Method, IndyMethod>
    Instruction<Class, Constant, Field, Method, IndyMethod>
{
    /// Convert constant pool operands, stopping at the first one that fails
    pub fn try_map_pool<C, K, F, M, D, E>(
        &self,
        class: impl Fn(&Class) -> Result<C, E>,
        constant: impl Fn(&Constant) -> Result<K, E>,
        field: impl Fn(&Field) -> Result<F, E>,
        method: impl Fn(&Method) -> Result<M, E>,
        indy: impl Fn(&IndyMethod) -> Result<D, E>,
    ) -> Result<Instruction<C, K, F, M, D>, E> {
        use Instruction::*;
        Ok(map_pool_operands! {
            self;
            plain: [
                Nop, AConstNull, IConstM1, IConst0, IConst1, IConst2, IConst3, IConst4, IConst5,
                LConst0, LConst1, FConst0, FConst1, FConst2, DConst0, DConst1,
                IALoad, LALoad, FALoad, DALoad, AALoad, BALoad, CALoad, SALoad,
                IAStore, LAStore, FAStore, DAStore, AAStore, BAStore, CAStore, SAStore,
                Pop, Pop2, Dup, DupX1, DupX2, Dup2, Dup2X1, Dup2X2, Swap,
                IAdd, LAdd, FAdd, DAdd, ISub, LSub, FSub, DSub,
                IMul, LMul, FMul, DMul, IDiv, LDiv, FDiv, DDiv,
                IRem, LRem, FRem, DRem, INeg, LNeg, FNeg, DNeg,
                IAnd, LAnd, IOr, LOr, IXor, LXor,
                I2L, I2F, I2D, L2I, L2F, L2D, F2I, F2L, F2D, D2I, D2L, D2F, I2B, I2C, I2S,
                LCmp, ArrayLength, MonitorEnter, MonitorExit,
            ];
            copied: [
                BiPush(n), SiPush(n),
                ILoad(i), LLoad(i), FLoad(i), DLoad(i), ALoad(i),
                IStore(i), LStore(i), FStore(i), DStore(i), AStore(i),
                ISh(s), LSh(s), IInc(i, n), FCmp(m), DCmp(m), NewArray(t),
            ];
            Ldc(k) => Ldc(constant(k)?),
            Ldc2(k) => Ldc2(constant(k)?),
            GetStatic(f) => GetStatic(field(f)?),
            PutStatic(f) => PutStatic(field(f)?),
            GetField(f) => GetField(field(f)?),
            PutField(f) => PutField(field(f)?),
            Invoke(kind, m) => Invoke(*kind, method(m)?),
            InvokeDynamic(d) => InvokeDynamic(indy(d)?),
            New(c) => New(class(c)?),
            ANewArray(c) => ANewArray(class(c)?),
            MultiANewArray(c, dims) => MultiANewArray(class(c)?, *dims),
            CheckCast(c) => CheckCast(class(c)?),
            InstanceOf(c) => InstanceOf(class(c)?),
        })
    }
}

/// Branching JVM bytecode instruction
///
/// Every one of these ends a basic block. Jump targets are absolute offsets into the code array
/// and, for the instructions that may fall through, the offset of the next instruction is stored
/// alongside the jump target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction {
    If(OrdComparison, Offset, Offset), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Offset, Offset), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Offset, Offset),  // covers `if_acmpeq`, `if_acmpne`
    Goto(Offset),
    GotoW(Offset),
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Offset,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Offset>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Offset,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Offset)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
    IfNull(EqComparison, Offset, Offset), // covers `ifnull`, `ifnonnull`
}

impl BranchInstruction {
    /// If the instruction can fall through to the next instruction, get that next instruction
    pub fn fallthrough_target(&self) -> Option<Offset> {
        match self {
            BranchInstruction::Goto(_)
            | BranchInstruction::GotoW(_)
            | BranchInstruction::TableSwitch { .. }
            | BranchInstruction::LookupSwitch { .. }
            | BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => None,

            BranchInstruction::If(_, _, next)
            | BranchInstruction::IfICmp(_, _, next)
            | BranchInstruction::IfACmp(_, _, next)
            | BranchInstruction::IfNull(_, _, next) => Some(*next),
        }
    }

    /// Non-fallthrough targets of the instruction (for switches, `default` comes first)
    pub fn jump_targets(&self) -> Vec<Offset> {
        match self {
            BranchInstruction::If(_, target, _)
            | BranchInstruction::IfICmp(_, target, _)
            | BranchInstruction::IfACmp(_, target, _)
            | BranchInstruction::IfNull(_, target, _)
            | BranchInstruction::Goto(target)
            | BranchInstruction::GotoW(target) => vec![*target],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().copied());
                ts
            }
            BranchInstruction::LookupSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().map(|(_, target)| *target));
                ts
            }
            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => vec![],
        }
    }

    /// Every offset control may continue at after this instruction
    ///
    /// The fallthrough target (if any) comes last.
    pub fn successors(&self) -> Vec<Offset> {
        let mut successors = self.jump_targets();
        successors.extend(self.fallthrough_target());
        successors
    }
}

/// Either a straight-line or a branching instruction
#[derive(Clone, Debug, PartialEq)]
pub enum AnyInstruction<Class, Constant, Field, Method, IndyMethod> {
    Regular(Instruction<Class, Constant, Field, Method, IndyMethod>),
    Branch(BranchInstruction),
}

/// Instruction as it is decoded, with constant pool indices as operands
pub type RawInstruction = AnyInstruction<u16, u16, u16, u16, u16>;

/// Straight-line instruction with operands resolved into the types they refer to
pub type ResolvedInstruction = Instruction<
    RefType<BinaryName>,
    ConstantData,
    FieldRef,
    MethodRef,
    InvokeDynamicRef,
>;

/// Instruction with operands resolved into the types they refer to
pub type VerifierInstruction = AnyInstruction<
    RefType<BinaryName>,
    ConstantData,
    FieldRef,
    MethodRef,
    InvokeDynamicRef,
>;

impl RawInstruction {
    /// Look up every constant pool index the instruction mentions
    pub fn resolve<R: ConstantResolver + ?Sized>(
        &self,
        constants: &R,
    ) -> Result<VerifierInstruction, VerifierErrorKind> {
        let insn = match self {
            AnyInstruction::Branch(branch) => return Ok(AnyInstruction::Branch(branch.clone())),
            AnyInstruction::Regular(insn) => insn,
        };
        let resolved = insn.try_map_pool(
            |&index| constants.resolve_class(index),
            |&index| constants.resolve_constant(index),
            |&index| constants.resolve_field(index),
            |&index| constants.resolve_method(index),
            |&index| constants.resolve_invoke_dynamic(index),
        )?;
        Ok(AnyInstruction::Regular(resolved))
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Constant::MethodRef`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn branch_successors() {
        let cond = BranchInstruction::IfICmp(OrdComparison::EQ, Offset(20), Offset(12));
        assert_eq!(cond.successors(), vec![Offset(20), Offset(12)]);

        let goto = BranchInstruction::Goto(Offset(4));
        assert_eq!(goto.successors(), vec![Offset(4)]);
        assert_eq!(goto.fallthrough_target(), None);

        let switch = BranchInstruction::LookupSwitch {
            default: Offset(40),
            targets: vec![(-1, Offset(28)), (7, Offset(34))],
        };
        assert_eq!(
            switch.successors(),
            vec![Offset(40), Offset(28), Offset(34)]
        );

        assert!(BranchInstruction::AThrow.successors().is_empty());
        assert!(BranchInstruction::Return.successors().is_empty());
    }

    #[test]
    fn resolve_pool_operands() {
        let mut constants = ConstantTable::new();
        constants.insert(
            3,
            ConstantEntry::Data(ConstantData::Class(RefType::Object(BinaryName::STRING))),
        );
        constants.insert(4, ConstantEntry::Data(ConstantData::Long(9)));

        let raw: RawInstruction = AnyInstruction::Regular(Instruction::MultiANewArray(3, 2));
        assert_eq!(
            raw.resolve(&constants),
            Ok(AnyInstruction::Regular(Instruction::MultiANewArray(
                RefType::Object(BinaryName::STRING),
                2
            )))
        );

        let raw: RawInstruction = AnyInstruction::Regular(Instruction::Ldc2(4));
        assert_eq!(
            raw.resolve(&constants),
            Ok(AnyInstruction::Regular(Instruction::Ldc2(ConstantData::Long(9))))
        );

        let raw: RawInstruction = AnyInstruction::Regular(Instruction::IInc(1, -1));
        assert_eq!(
            raw.resolve(&constants),
            Ok(AnyInstruction::Regular(Instruction::IInc(1, -1)))
        );

        let raw: RawInstruction = AnyInstruction::Regular(Instruction::GetStatic(4));
        assert_eq!(
            raw.resolve(&constants),
            Err(VerifierErrorKind::WrongConstantKind(4))
        );
        let raw: RawInstruction = AnyInstruction::Regular(Instruction::New(8));
        assert_eq!(
            raw.resolve(&constants),
            Err(VerifierErrorKind::MissingConstant(8))
        );
    }
}
