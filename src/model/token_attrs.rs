//! The closed set of semantic token kinds, plus the decl/def flag bits.

/// A single semantic classification for a token, produced by the tag
/// speller. Mirrors the Pygments-ish class scheme used by the HTML renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TokenKind {
    None,
    Attr,
    Cmmt,
    Constant,
    Func,
    Kw,
    KwDecl,
    Lbl,
    Lit,
    LitChr,
    LitKw,
    LitNum,
    LitNumFlt,
    LitNumIntBin,
    LitNumIntDecLong,
    LitNumIntHex,
    LitNumIntOct,
    LitStr,
    Namesp,
    Op,
    OpWord,
    Pre,
    PreIncludeFile,
    Punct,
    Ty,
    TyBuiltin,
    VarGlobal,
    VarLocal,
    VarNonstaticMember,
    VarStaticMember,
}

impl TokenKind {
    /// The Pygments-scheme CSS class name for this kind, or `None` if the
    /// kind carries no class of its own (only `none` renders bare).
    pub fn css_class(self) -> Option<&'static str> {
        use TokenKind::*;
        match self {
            None => Option::None,
            Attr => Some("nd"),
            Cmmt => Some("c"),
            Constant => Some("no"),
            Func => Some("nf"),
            Kw => Some("k"),
            KwDecl => Some("kd"),
            Lbl => Some("nl"),
            Lit => Some("l"),
            LitChr => Some("sc"),
            LitKw => Some("kc"),
            LitNum => Some("mi"),
            LitNumFlt => Some("mf"),
            LitNumIntBin => Some("mb"),
            LitNumIntDecLong => Some("ml"),
            LitNumIntHex => Some("mh"),
            LitNumIntOct => Some("mo"),
            LitStr => Some("s"),
            Namesp => Some("nn"),
            Op => Some("o"),
            OpWord => Some("ow"),
            Pre => Some("cp"),
            PreIncludeFile => Some("cpf"),
            Punct => Some("p"),
            Ty => Some("nc"),
            TyBuiltin => Some("kt"),
            VarGlobal => Some("vg"),
            VarLocal => Some("nv"),
            VarNonstaticMember => Some("vi"),
            VarStaticMember => Some("vc"),
        }
    }
}

/// `TokenKind` plus the `flagDecl`/`flagDef` bits, attached to every markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAttributes {
    pub kind: TokenKind,
    pub flag_decl: bool,
    pub flag_def: bool,
}

impl TokenAttributes {
    pub fn new(kind: TokenKind) -> Self {
        TokenAttributes {
            kind,
            flag_decl: false,
            flag_def: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == TokenKind::None && !self.flag_decl && !self.flag_def
    }

    /// The full space-joined class list, e.g. `"def decl nf"`.
    pub fn css_classes(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.flag_def {
            parts.push("def");
        }
        if self.flag_decl {
            parts.push("decl");
        }
        if let Some(class) = self.kind.css_class() {
            parts.push(class);
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_flags_are_independent() {
        let mut attrs = TokenAttributes::new(TokenKind::Func);
        attrs.flag_decl = true;
        attrs.flag_def = true;
        assert_eq!(attrs.css_classes(), "def decl nf");
    }

    #[test]
    fn bare_kind_has_no_flag_prefix() {
        let attrs = TokenAttributes::new(TokenKind::Kw);
        assert_eq!(attrs.css_classes(), "k");
    }

    #[test]
    fn var_local_renders_nv_and_none_renders_no_class() {
        assert_eq!(TokenKind::VarLocal.css_class(), Some("nv"));
        assert_eq!(TokenKind::None.css_class(), None);
    }
}
