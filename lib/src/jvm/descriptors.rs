//! Field and method descriptors
//!
//! See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.3>

use super::{BinaryName, Name};
use crate::util::Width;
use std::fmt::{Display, Error as FmtError, Formatter};

/// Utility trait for converting descriptors to their string representation
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

/// Utility trait for reading descriptors out of their string representation
pub trait ParseDescriptor: Sized {
    /// Parse a descriptor, failing if there is anything left over
    fn parse(source: &str) -> Result<Self, DescriptorError> {
        let mut reader = DescriptorReader::new(source);
        let parsed = Self::read(&mut reader)?;
        match reader.peek() {
            None => Ok(parsed),
            Some(found) => Err(DescriptorError::TrailingInput {
                position: reader.position,
                found,
            }),
        }
    }

    /// Read the descriptor from the reader, leaving it just after the descriptor
    fn read(reader: &mut DescriptorReader) -> Result<Self, DescriptorError>;
}

/// Reasons a descriptor can fail to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Input ended while something was still expected
    UnexpectedEnd { expected: &'static str },

    /// Character at a byte position can't start or continue the descriptor
    UnexpectedChar {
        position: usize,
        found: char,
        expected: &'static str,
    },

    /// Class name between `L` and `;` is not a valid binary name
    InvalidClassName(String),

    /// Descriptor was complete but followed by more input
    TrailingInput { position: usize, found: char },
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            DescriptorError::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of descriptor (expected {})", expected)
            }
            DescriptorError::UnexpectedChar {
                position,
                found,
                expected,
            } => write!(
                f,
                "unexpected '{}' at {} (expected {})",
                found, position, expected
            ),
            DescriptorError::InvalidClassName(msg) => f.write_str(msg),
            DescriptorError::TrailingInput { position, found } => {
                write!(f, "leftover input '{}' at {}", found, position)
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Cursor over the characters of a descriptor
pub struct DescriptorReader<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> DescriptorReader<'a> {
    pub fn new(source: &'a str) -> DescriptorReader<'a> {
        DescriptorReader {
            source,
            position: 0,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    /// Consume the next character, which must exist
    fn next(&mut self, expected: &'static str) -> Result<char, DescriptorError> {
        let c = self
            .peek()
            .ok_or(DescriptorError::UnexpectedEnd { expected })?;
        self.position += c.len_utf8();
        Ok(c)
    }

    /// Consume the next character if it is `c`
    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.position += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume exactly the character `c`
    fn expect(&mut self, c: char, expected: &'static str) -> Result<(), DescriptorError> {
        let position = self.position;
        match self.next(expected)? {
            found if found == c => Ok(()),
            found => Err(DescriptorError::UnexpectedChar {
                position,
                found,
                expected,
            }),
        }
    }

    fn unexpected(&self, expected: &'static str) -> DescriptorError {
        match self.peek() {
            Some(found) => DescriptorError::UnexpectedChar {
                position: self.position,
                found,
                expected,
            },
            None => DescriptorError::UnexpectedEnd { expected },
        }
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    const ALL: [(BaseType, char); 8] = [
        (BaseType::Byte, 'B'),
        (BaseType::Char, 'C'),
        (BaseType::Double, 'D'),
        (BaseType::Float, 'F'),
        (BaseType::Int, 'I'),
        (BaseType::Long, 'J'),
        (BaseType::Short, 'S'),
        (BaseType::Boolean, 'Z'),
    ];

    pub fn from_char(c: char) -> Option<BaseType> {
        BaseType::ALL
            .iter()
            .find(|(_, code)| *code == c)
            .map(|(base_type, _)| *base_type)
    }

    pub fn as_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        write_to.push(self.as_char());
    }
}

impl ParseDescriptor for BaseType {
    fn read(reader: &mut DescriptorReader) -> Result<Self, DescriptorError> {
        let found = reader.peek().and_then(BaseType::from_char);
        match found {
            Some(base_type) => {
                reader.position += 1;
                Ok(base_type)
            }
            None => Err(reader.unexpected("a primitive type")),
        }
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Array type, stored as its innermost element type and its dimensions
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        write_to.extend(std::iter::repeat('[').take(self.additional_dimensions + 1));
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn read(reader: &mut DescriptorReader) -> Result<Self, DescriptorError> {
        reader.expect('L', "'L' to start a class type")?;
        let rest = &reader.source[reader.position..];
        let length = rest.find(';').ok_or(DescriptorError::UnexpectedEnd {
            expected: "';' to end a class type",
        })?;
        let class_name = rest[..length].to_owned();
        reader.position += length + 1;
        BinaryName::from_string(class_name).map_err(DescriptorError::InvalidClassName)
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(class) => class.render_to(write_to),
            RefType::PrimitiveArray(array) => array.render_to(write_to),
            RefType::ObjectArray(array) => array.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for RefType<C> {
    fn read(reader: &mut DescriptorReader) -> Result<Self, DescriptorError> {
        let mut dimensions = 0;
        while reader.eat('[') {
            dimensions += 1;
        }

        let is_object = reader.peek() == Some('L');
        match dimensions {
            0 if is_object => Ok(RefType::Object(C::read(reader)?)),
            0 => Err(reader.unexpected("'L' or '[' to start a reference type")),
            _ if is_object => Ok(RefType::ObjectArray(ArrayType {
                additional_dimensions: dimensions - 1,
                element_type: C::read(reader)?,
            })),
            _ => Ok(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: dimensions - 1,
                element_type: BaseType::read(reader)?,
            })),
        }
    }
}

impl<C> RefType<C> {
    /// Array whose elements have the given type
    pub fn array(component_type: FieldType<C>) -> RefType<C> {
        match component_type {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::PrimitiveArray(mut array)) => {
                array.additional_dimensions += 1;
                RefType::PrimitiveArray(array)
            }
            FieldType::Ref(RefType::ObjectArray(mut array)) => {
                array.additional_dimensions += 1;
                RefType::ObjectArray(array)
            }
        }
    }

    /// Is this an array type?
    pub fn is_array(&self) -> bool {
        !matches!(self, RefType::Object(_))
    }
}

impl<C: Clone> RefType<C> {
    /// Type of the elements of an array (`None` if this is not an array type)
    ///
    /// This is the inverse of [`RefType::array`].
    pub fn component_type(&self) -> Option<FieldType<C>> {
        let component = match self {
            RefType::Object(_) => return None,
            RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }) => FieldType::Base(*element_type),
            RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }) => FieldType::object(element_type.clone()),
            RefType::PrimitiveArray(array) => FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: array.additional_dimensions - 1,
                element_type: array.element_type,
            })),
            RefType::ObjectArray(array) => FieldType::Ref(RefType::ObjectArray(ArrayType {
                additional_dimensions: array.additional_dimensions - 1,
                element_type: array.element_type.clone(),
            })),
        };
        Some(component)
    }
}

/// Type of a field, parameter, or return value
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub fn array(component_type: FieldType<C>) -> FieldType<C> {
        FieldType::Ref(RefType::array(component_type))
    }

    pub const fn object(class_name: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType<C> {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType<C> {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType<C> {
        FieldType::Base(BaseType::Double)
    }

    pub const fn char() -> FieldType<C> {
        FieldType::Base(BaseType::Char)
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(ref_type) => ref_type.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for FieldType<C> {
    fn read(reader: &mut DescriptorReader) -> Result<Self, DescriptorError> {
        match reader.peek() {
            Some('L' | '[') => RefType::read(reader).map(FieldType::Ref),
            _ => BaseType::read(reader)
                .map(FieldType::Base)
                .map_err(|_| reader.unexpected("a field type")),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,

    /// `None` is for `void`
    pub return_type: Option<FieldType<Class>>,
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl<C: ParseDescriptor> ParseDescriptor for MethodDescriptor<C> {
    fn read(reader: &mut DescriptorReader) -> Result<Self, DescriptorError> {
        reader.expect('(', "'(' to start the parameters")?;
        let mut parameters = vec![];
        while !reader.eat(')') {
            if reader.peek().is_none() {
                return Err(DescriptorError::UnexpectedEnd {
                    expected: "')' to end the parameters",
                });
            }
            parameters.push(FieldType::read(reader)?);
        }

        let return_type = if reader.eat('V') {
            None
        } else {
            Some(FieldType::read(reader)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type FT = FieldType<BinaryName>;

    const INT: FT = FieldType::int();
    const DOUBLE: FT = FieldType::double();
    const STRING: FT = FieldType::object(BinaryName::STRING);

    #[test]
    fn field_types() {
        assert_eq!(FT::parse("J"), Ok(FieldType::long()));
        assert_eq!(
            FT::parse("[[[D"),
            Ok(FieldType::array(FieldType::array(FieldType::array(DOUBLE))))
        );
        assert_eq!(FieldType::array(STRING).render(), "[Ljava/lang/String;");
        assert_eq!(FieldType::<BinaryName>::char().render(), "C");
    }

    #[test]
    fn method_descriptors() {
        let descriptor = MethodDescriptor {
            parameters: vec![INT, DOUBLE, STRING],
            return_type: Some(FieldType::object(BinaryName::OBJECT)),
        };
        let rendered = "(IDLjava/lang/String;)Ljava/lang/Object;";
        assert_eq!(descriptor.render(), rendered);
        assert_eq!(MethodDescriptor::parse(rendered), Ok(descriptor.clone()));

        let void = MethodDescriptor::<BinaryName>::parse("()V").unwrap();
        assert_eq!(void.parameters, vec![]);
        assert_eq!(void.return_type, None);
    }

    #[test]
    fn malformed() {
        assert_eq!(
            FT::parse("Q"),
            Err(DescriptorError::UnexpectedChar {
                position: 0,
                found: 'Q',
                expected: "a field type"
            })
        );
        assert_eq!(
            FT::parse("Ljava/lang/String"),
            Err(DescriptorError::UnexpectedEnd {
                expected: "';' to end a class type"
            })
        );
        assert_eq!(
            FT::parse("II"),
            Err(DescriptorError::TrailingInput {
                position: 1,
                found: 'I'
            })
        );
        assert!(matches!(
            FT::parse("L;"),
            Err(DescriptorError::InvalidClassName(_))
        ));
        assert!(matches!(
            MethodDescriptor::<BinaryName>::parse("(I"),
            Err(DescriptorError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            MethodDescriptor::<BinaryName>::parse("I)V"),
            Err(DescriptorError::UnexpectedChar { position: 0, .. })
        ));
    }

    #[test]
    fn component_types() {
        let ints = RefType::<BinaryName>::array(INT);
        assert_eq!(ints.component_type(), Some(INT));

        let strings_2d = RefType::array(FieldType::array(STRING));
        assert_eq!(strings_2d.component_type(), Some(FieldType::array(STRING)));

        let object = RefType::Object(BinaryName::OBJECT);
        assert!(!object.is_array());
        assert_eq!(object.component_type(), None);
    }
}
