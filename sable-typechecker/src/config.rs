//! Resolver configuration

/// Options controlling a single compilation's symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Chain the global scope to the shared prelude
    pub include_prelude: bool,

    /// Reject overlapping instances when they are registered
    pub check_overlap: bool,

    /// Retry failed instance matches with alias-expanded types
    pub alias_retry: bool,

    /// Let existence checks match `Functor<List>` against `List<Int>`
    pub constructor_fallback: bool,

    /// Accept an overlapping instance when the more general one carries
    /// requirements; the most specific instance then wins at match time
    pub allow_specialized_overlap: bool,
}

impl ResolverConfig {
    /// Configuration for a table that does not see the prelude
    pub fn isolated() -> Self {
        Self {
            include_prelude: false,
            ..Self::default()
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            include_prelude: true,
            check_overlap: true,
            alias_retry: true,
            constructor_fallback: true,
            allow_specialized_overlap: true,
        }
    }
}
