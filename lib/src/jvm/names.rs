use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods and fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in their internal form (eg. `java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: &str) -> Result<(), String>;

    /// Wrap a string that is already known to be valid
    fn from_cow_unchecked(name: Cow<'static, str>) -> Self;

    fn as_str(&self) -> &str;

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(Self::from_cow_unchecked(Cow::Owned(name)))
    }
}

impl Name for UnqualifiedName {
    fn check_valid(name: &str) -> Result<(), String> {
        let is_special = name == "<init>" || name == "<clinit>";
        if name.is_empty() {
            Err(String::from("Unqualified name is empty"))
        } else if let Some(c) = name.chars().find(|c| matches!(c, '.' | ';' | '[' | '/')) {
            Err(format!("Unqualified name '{}' contains '{}'", name, c))
        } else if !is_special && name.contains(&['<', '>'][..]) {
            Err(format!("Unqualified name '{}' contains angle brackets", name))
        } else {
            Ok(())
        }
    }

    fn from_cow_unchecked(name: Cow<'static, str>) -> Self {
        UnqualifiedName(name)
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Name for BinaryName {
    /// Every `/`-separated segment must itself be a valid unqualified name
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(String::from("Binary name is empty"));
        }
        name.split('/')
            .try_for_each(UnqualifiedName::check_valid)
            .map_err(|msg| format!("Binary name '{}' is invalid: {}", name, msg))
    }

    fn from_cow_unchecked(name: Cow<'static, str>) -> Self {
        BinaryName(name)
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! name_formatting {
    ($name:ident) => {
        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
                f.write_str(&self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
                f.write_str(&self.0)
            }
        }
    };
}

name_formatting!(UnqualifiedName);
name_formatting!(BinaryName);

impl UnqualifiedName {
    /// Instance initialization method
    pub const INIT: Self = UnqualifiedName(Cow::Borrowed("<init>"));

    /// Class initialization method
    pub const CLINIT: Self = UnqualifiedName(Cow::Borrowed("<clinit>"));
}

impl BinaryName {
    pub const CLASS: Self = BinaryName(Cow::Borrowed("java/lang/Class"));
    pub const METHODHANDLE: Self = BinaryName(Cow::Borrowed("java/lang/invoke/MethodHandle"));
    pub const METHODTYPE: Self = BinaryName(Cow::Borrowed("java/lang/invoke/MethodType"));
    pub const OBJECT: Self = BinaryName(Cow::Borrowed("java/lang/Object"));
    pub const STRING: Self = BinaryName(Cow::Borrowed("java/lang/String"));
    pub const THROWABLE: Self = BinaryName(Cow::Borrowed("java/lang/Throwable"));
}
