use crate::jvm::{
    BaseType, BinaryName, FieldType, ParseDescriptor, RefType, RenderDescriptor, VerifierErrorKind,
};
use crate::util::{Offset, Width};
use std::fmt::{Display, Error as FmtError, Formatter};

/// These types are from [this hierarchy][0], plus `Top` for unusable local variable slots
///
/// `Object` covers every initialized reference (including arrays) and `Null` is the type of the
/// `null` constant.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType {
    /// Second slot of a `long` or `double` local, or a slot that can't be loaded
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis(RefType<BinaryName>),

    /// Object type
    Object(RefType<BinaryName>),

    /// State of an object after `new` has been called but `<init>` has not been called
    Uninitialized(UninitializedRefType),
}

impl VerificationType {
    /// Initialized object of a class
    pub fn object(class: BinaryName) -> VerificationType {
        VerificationType::Object(RefType::Object(class))
    }

    /// Parse a field descriptor (eg. `J` or `[Ljava/lang/String;`) into a verification type
    pub fn from_descriptor(descriptor: &str) -> Result<VerificationType, VerifierErrorKind> {
        FieldType::<BinaryName>::parse(descriptor)
            .map(VerificationType::from)
            .map_err(VerifierErrorKind::BadDescriptor)
    }

    /// Is this a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis(_)
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }

    /// Does the type take up two local slots or stack words?
    pub fn is_category2(&self) -> bool {
        self.width() == 2
    }

    /// Number of words on the operand stack this type takes up
    pub fn operand_size(&self) -> usize {
        self.width()
    }
}

impl From<FieldType<BinaryName>> for VerificationType {
    fn from(field_type: FieldType<BinaryName>) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(ref_type) => VerificationType::Object(ref_type),
        }
    }
}

impl Width for VerificationType {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl Display for VerificationType {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("int"),
            VerificationType::Float => f.write_str("float"),
            VerificationType::Double => f.write_str("double"),
            VerificationType::Long => f.write_str("long"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis(ref_type) => {
                write!(f, "uninitializedThis({})", ref_type.render())
            }
            VerificationType::Object(ref_type) => f.write_str(&ref_type.render()),
            VerificationType::Uninitialized(uninit) => write!(
                f,
                "uninitialized({}@{})",
                uninit.verification_type.render(),
                uninit.created_at.0
            ),
        }
    }
}

/// After a `new` instruction, the top of the stack will contain an uninitialized value. Two
/// `new` instructions for the same class produce different uninitialized values, so the offset of
/// the instruction is part of the type.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct UninitializedRefType {
    /// Once the type is initialized, what will it be?
    pub verification_type: RefType<BinaryName>,

    /// Offset of the `new` instruction from the start of the method body
    pub created_at: Offset,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[test]
    fn categories() {
        use VerificationType::*;

        for typ in [Long, Double] {
            assert!(typ.is_category2());
            assert_eq!(typ.operand_size(), 2);
        }
        for typ in [Top, Integer, Float, Null, VerificationType::object(BinaryName::STRING)] {
            assert!(!typ.is_category2());
            assert_eq!(typ.operand_size(), 1);
        }
    }

    #[test]
    fn from_descriptors() {
        assert_eq!(
            VerificationType::from_descriptor("Z"),
            Ok(VerificationType::Integer)
        );
        assert_eq!(
            VerificationType::from_descriptor("J"),
            Ok(VerificationType::Long)
        );
        assert_eq!(
            VerificationType::from_descriptor("[[D"),
            Ok(VerificationType::Object(RefType::array(FieldType::array(
                FieldType::double()
            ))))
        );
        assert!(matches!(
            VerificationType::from_descriptor("Q"),
            Err(VerifierErrorKind::BadDescriptor(_))
        ));
    }

    #[test]
    fn uninitialized_identity() {
        let foo = RefType::Object(BinaryName::from_string(String::from("Foo")).unwrap());
        let at = |offset| {
            VerificationType::Uninitialized(UninitializedRefType {
                verification_type: foo.clone(),
                created_at: Offset(offset),
            })
        };

        assert_eq!(at(0), at(0));
        assert_ne!(at(0), at(3));
        assert!(at(0).is_reference());
        assert_eq!(at(3).to_string(), "uninitialized(LFoo;@3)");
    }

    #[test]
    fn display() {
        assert_eq!(VerificationType::Integer.to_string(), "int");
        assert_eq!(VerificationType::Top.to_string(), "top");
        assert_eq!(
            VerificationType::object(BinaryName::STRING).to_string(),
            "Ljava/lang/String;"
        );
    }
}
