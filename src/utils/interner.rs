//! Global string interner.
//!
//! Uniform names are compared and hashed on every bind, so they are interned into
//! compact [`Symbol`]s once and resolved back to text only when written to the backend.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Compact integer identifier of an interned string.
pub type Symbol = Spur;

/// Interns `s`, returning the existing symbol if it was seen before.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up `s` without interning it.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Interns the uniform names every synthesized program may declare.
pub fn preload_builtin_uniforms() {
    for name in [
        "texture0",
        "texture1",
        "texture2",
        "samplertex",
        "texture_scaling",
        "normal_scaling",
        "lookup_offsets",
        "lookup_scales",
        "texturesize",
    ] {
        intern(name);
    }
}
