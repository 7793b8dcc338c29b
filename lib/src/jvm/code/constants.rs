use crate::jvm::verifier::VerificationType;
use crate::jvm::{
    BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName, VerifierErrorKind,
};
use std::collections::BTreeMap;

/// Constant which can be loaded onto the stack with `ldc`, `ldc_w`, or `ldc2_w`
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantData {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType<BinaryName>),
    MethodType(MethodDescriptor<BinaryName>),
    MethodHandle,
}

impl ConstantData {
    /// Type of the value pushed by loading the constant
    pub fn verification_type(&self) -> VerificationType {
        match self {
            ConstantData::Integer(_) => VerificationType::Integer,
            ConstantData::Float(_) => VerificationType::Float,
            ConstantData::Long(_) => VerificationType::Long,
            ConstantData::Double(_) => VerificationType::Double,
            ConstantData::String(_) => VerificationType::object(BinaryName::STRING),
            ConstantData::Class(_) => VerificationType::object(BinaryName::CLASS),
            ConstantData::MethodType(_) => VerificationType::object(BinaryName::METHODTYPE),
            ConstantData::MethodHandle => VerificationType::object(BinaryName::METHODHANDLE),
        }
    }
}

/// Field referred to by `getfield`, `putfield`, `getstatic`, or `putstatic`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
}

/// Method referred to by one of the `invoke*` instructions (except `invokedynamic`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodRef {
    /// Class on which the method is defined (array types show up for methods like `clone`)
    pub class: RefType<BinaryName>,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_interface: bool,
}

impl MethodRef {
    /// Is this an instance initialization method?
    pub fn is_init(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }
}

/// Call site referred to by `invokedynamic`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvokeDynamicRef {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
}

/// Resolves the constant pool operands of instructions into the semantic types they refer to
///
/// This is the only view of the constant pool the analysis has. Implementations return
/// [`VerifierErrorKind::MissingConstant`] for indices with no entry, and
/// [`VerifierErrorKind::WrongConstantKind`] for entries of an unexpected kind.
pub trait ConstantResolver {
    /// Class, interface, or array type (`new`, `checkcast`, `anewarray`, ...)
    fn resolve_class(&self, index: u16) -> Result<RefType<BinaryName>, VerifierErrorKind>;

    /// Loadable constant (`ldc`, `ldc_w`, `ldc2_w`)
    fn resolve_constant(&self, index: u16) -> Result<ConstantData, VerifierErrorKind>;

    /// Field reference
    fn resolve_field(&self, index: u16) -> Result<FieldRef, VerifierErrorKind>;

    /// Method or interface method reference
    fn resolve_method(&self, index: u16) -> Result<MethodRef, VerifierErrorKind>;

    /// Dynamically-computed call site
    fn resolve_invoke_dynamic(&self, index: u16) -> Result<InvokeDynamicRef, VerifierErrorKind>;
}

/// Entry in a [`ConstantTable`]
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantEntry {
    Data(ConstantData),
    Field(FieldRef),
    Method(MethodRef),
    InvokeDynamic(InvokeDynamicRef),
}

/// In-memory constant pool, holding already-resolved entries
#[derive(Clone, Debug, Default)]
pub struct ConstantTable {
    entries: BTreeMap<u16, ConstantEntry>,
}

impl ConstantTable {
    pub fn new() -> ConstantTable {
        ConstantTable::default()
    }

    /// Add (or replace) the entry at an index
    pub fn insert(&mut self, index: u16, entry: ConstantEntry) -> Option<ConstantEntry> {
        self.entries.insert(index, entry)
    }

    pub fn get(&self, index: u16) -> Option<&ConstantEntry> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, index: u16) -> Result<&ConstantEntry, VerifierErrorKind> {
        self.entries
            .get(&index)
            .ok_or(VerifierErrorKind::MissingConstant(index))
    }
}

impl ConstantResolver for ConstantTable {
    fn resolve_class(&self, index: u16) -> Result<RefType<BinaryName>, VerifierErrorKind> {
        match self.lookup(index)? {
            ConstantEntry::Data(ConstantData::Class(class)) => Ok(class.clone()),
            _ => Err(VerifierErrorKind::WrongConstantKind(index)),
        }
    }

    fn resolve_constant(&self, index: u16) -> Result<ConstantData, VerifierErrorKind> {
        match self.lookup(index)? {
            ConstantEntry::Data(data) => Ok(data.clone()),
            _ => Err(VerifierErrorKind::WrongConstantKind(index)),
        }
    }

    fn resolve_field(&self, index: u16) -> Result<FieldRef, VerifierErrorKind> {
        match self.lookup(index)? {
            ConstantEntry::Field(field) => Ok(field.clone()),
            _ => Err(VerifierErrorKind::WrongConstantKind(index)),
        }
    }

    fn resolve_method(&self, index: u16) -> Result<MethodRef, VerifierErrorKind> {
        match self.lookup(index)? {
            ConstantEntry::Method(method) => Ok(method.clone()),
            _ => Err(VerifierErrorKind::WrongConstantKind(index)),
        }
    }

    fn resolve_invoke_dynamic(&self, index: u16) -> Result<InvokeDynamicRef, VerifierErrorKind> {
        match self.lookup(index)? {
            ConstantEntry::InvokeDynamic(indy) => Ok(indy.clone()),
            _ => Err(VerifierErrorKind::WrongConstantKind(index)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolution_checks_entry_kind() {
        let mut constants = ConstantTable::new();
        constants.insert(1, ConstantEntry::Data(ConstantData::Integer(42)));
        constants.insert(
            2,
            ConstantEntry::Data(ConstantData::Class(RefType::Object(BinaryName::OBJECT))),
        );

        assert_eq!(constants.resolve_constant(1), Ok(ConstantData::Integer(42)));
        assert_eq!(
            constants.resolve_class(2),
            Ok(RefType::Object(BinaryName::OBJECT))
        );
        assert_eq!(
            constants.resolve_class(1),
            Err(VerifierErrorKind::WrongConstantKind(1))
        );
        assert_eq!(
            constants.resolve_field(3),
            Err(VerifierErrorKind::MissingConstant(3))
        );
    }

    #[test]
    fn loaded_constant_types() {
        assert_eq!(
            ConstantData::Long(1).verification_type(),
            VerificationType::Long
        );
        assert_eq!(
            ConstantData::String(String::from("hi")).verification_type(),
            VerificationType::object(BinaryName::STRING)
        );
        assert_eq!(
            ConstantData::Class(RefType::array(FieldType::int())).verification_type(),
            VerificationType::object(BinaryName::CLASS)
        );
    }
}
