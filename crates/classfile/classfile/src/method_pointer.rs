/// Identifies a method by its declaring class's internal name (`a/b/C` form), its name, and
/// its JVM descriptor (`(Lfoo/Bar;)V`). This is the unit of identity the memoizer keys its call
/// stack and cache on, one layer up in `nbtschema-runtime`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPointer {
    pub class: String,
    pub name: String,
    pub signature: String,
}

impl MethodPointer {
    pub fn new(class: impl Into<String>, name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self { class: class.into(), name: name.into(), signature: signature.into() }
    }
}

impl std::fmt::Display for MethodPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.signature)
    }
}
