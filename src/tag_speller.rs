//! Maps a `(tokenKind, cursorKind, spelling)` triple to a [`TokenKind`] (C1).
//!
//! Pure and thread-safe: no shared state, no I/O. Everything here is driven
//! purely off clang's own token/cursor classification, so the same input
//! always yields the same output regardless of which thread or which
//! translation unit is doing the asking.

use clang::token::TokenKind as ClangTokenKind;
use clang::{Entity, EntityKind, Linkage};

use crate::model::token_attrs::TokenKind;

const MAX_REF_RECURSION: u32 = 16;

const BUILTIN_TYPE_WORDS: &[&str] = &[
    "void", "bool", "char", "char16_t", "char32_t", "wchar_t", "int", "float", "double",
    "signed", "unsigned", "short", "long",
];

fn is_builtin_type_spelling(spelling: &str) -> bool {
    if BUILTIN_TYPE_WORDS.contains(&spelling) {
        return true;
    }
    for prefix in ["signed ", "unsigned ", "short ", "long "] {
        if spelling.starts_with(prefix) {
            return true;
        }
    }
    false
}

fn is_preprocessing_entity(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::InclusionDirective
            | EntityKind::MacroDefinition
            | EntityKind::MacroExpansion
            | EntityKind::PreprocessingDirective
    )
}

fn is_operator_expr(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::BinaryOperator
            | EntityKind::CompoundAssignOperator
            | EntityKind::UnaryOperator
            | EntityKind::ConditionalOperator
    )
}

fn is_type_like(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::StructDecl
            | EntityKind::UnionDecl
            | EntityKind::EnumDecl
            | EntityKind::ClassDecl
            | EntityKind::ClassTemplate
            | EntityKind::ClassTemplatePartialSpecialization
            | EntityKind::TypedefDecl
            | EntityKind::TypeAliasDecl
            | EntityKind::TypeAliasTemplateDecl
            | EntityKind::TypeRef
            | EntityKind::TemplateRef
            | EntityKind::BaseSpecifier
            | EntityKind::TemplateTypeParameter
            | EntityKind::ObjCInterfaceDecl
            | EntityKind::ObjCCategoryDecl
            | EntityKind::ObjCProtocolDecl
            | EntityKind::ObjCImplementationDecl
            | EntityKind::ObjCCategoryImplDecl
    )
}

fn is_literal_keyword_spelling(spelling: &str) -> bool {
    matches!(spelling, "nullptr" | "true" | "false" | "YES" | "NO")
}

fn is_function_like(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::FunctionDecl
            | EntityKind::Method
            | EntityKind::Constructor
            | EntityKind::Destructor
            | EntityKind::ConversionFunction
            | EntityKind::FunctionTemplate
            | EntityKind::OverloadedDeclRef
    )
}

fn is_variable_decl(kind: EntityKind) -> bool {
    matches!(kind, EntityKind::VarDecl | EntityKind::FieldDecl)
}

fn is_namespace_like(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Namespace
            | EntityKind::NamespaceAlias
            | EntityKind::NamespaceRef
            | EntityKind::UsingDirective
    )
}

fn is_redispatching_ref(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::MemberRef
            | EntityKind::MemberRefExpr
            | EntityKind::DeclRefExpr
            | EntityKind::UsingDeclaration
            | EntityKind::TemplateRef
    )
}

fn is_attribute(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::UnexposedAttr
            | EntityKind::IbActionAttr
            | EntityKind::IbOutletAttr
            | EntityKind::IbOutletCollectionAttr
            | EntityKind::AnnotateAttr
            | EntityKind::AsmLabelAttr
            | EntityKind::PackedAttr
            | EntityKind::PureAttr
            | EntityKind::ConstAttr
            | EntityKind::NoDuplicateAttr
            | EntityKind::CudaConstantAttr
            | EntityKind::CudaDeviceAttr
            | EntityKind::CudaGlobalAttr
            | EntityKind::CudaHostAttr
            | EntityKind::CudaSharedAttr
            | EntityKind::VisibilityAttr
            | EntityKind::DllExport
            | EntityKind::DllImport
    )
}

fn int_literal_kind(spelling: &str) -> TokenKind {
    let lower = spelling.to_ascii_lowercase();
    if lower.starts_with("0x") {
        TokenKind::LitNumIntHex
    } else if lower.starts_with("0b") {
        TokenKind::LitNumIntBin
    } else if spelling.starts_with('0') && spelling.len() > 1 {
        TokenKind::LitNumIntOct
    } else if lower.ends_with('l') {
        TokenKind::LitNumIntDecLong
    } else {
        TokenKind::LitNum
    }
}

/// `(tokenKind, cursorKind, spelling)` -> `TokenKind`, evaluated per the
/// rule cascade: preprocessing constructs first, then dispatch by token
/// kind, with identifiers needing the richest cursor-kind dispatch.
pub fn classify(token_kind: ClangTokenKind, cursor: Entity, spelling: &str) -> TokenKind {
    let cursor_kind = cursor.get_kind();

    if is_preprocessing_entity(cursor_kind) {
        if cursor_kind == EntityKind::InclusionDirective && spelling != "include" && spelling != "#" {
            return TokenKind::PreIncludeFile;
        }
        return TokenKind::Pre;
    }

    match token_kind {
        ClangTokenKind::Punctuation => {
            if is_operator_expr(cursor_kind) {
                TokenKind::Op
            } else {
                TokenKind::Punct
            }
        }
        ClangTokenKind::Comment => TokenKind::Cmmt,
        ClangTokenKind::Literal => match cursor_kind {
            EntityKind::StringLiteral | EntityKind::ObjCStringLiteral => TokenKind::LitStr,
            EntityKind::CharacterLiteral => TokenKind::LitChr,
            EntityKind::FloatingLiteral => TokenKind::LitNumFlt,
            EntityKind::IntegerLiteral => int_literal_kind(spelling),
            EntityKind::ImaginaryLiteral => TokenKind::LitNum,
            _ => TokenKind::Lit,
        },
        ClangTokenKind::Keyword => {
            if is_operator_expr(cursor_kind) {
                TokenKind::OpWord
            } else if is_literal_keyword_spelling(spelling) {
                TokenKind::LitKw
            } else if cursor_kind == EntityKind::TypeRef || is_builtin_type_spelling(spelling) {
                TokenKind::TyBuiltin
            } else if matches!(spelling, "sizeof" | "alignof" | "_Alignof") {
                TokenKind::OpWord
            } else if spelling == "this" {
                TokenKind::LitKw
            } else if is_decl_like(cursor_kind) {
                TokenKind::KwDecl
            } else {
                TokenKind::Kw
            }
        }
        ClangTokenKind::Identifier => classify_identifier(cursor, cursor_kind, 0),
    }
}

fn is_decl_like(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::VarDecl
            | EntityKind::FunctionDecl
            | EntityKind::StructDecl
            | EntityKind::UnionDecl
            | EntityKind::EnumDecl
            | EntityKind::ClassDecl
            | EntityKind::TypedefDecl
            | EntityKind::DeclStmt
    )
}

fn classify_identifier(cursor: Entity, cursor_kind: EntityKind, depth: u32) -> TokenKind {
    if is_type_like(cursor_kind) {
        return TokenKind::Ty;
    }

    if is_redispatching_ref(cursor_kind) {
        if depth >= MAX_REF_RECURSION {
            tracing::warn!(
                "tag speller: reference recursion exceeded depth {} at {:?}",
                MAX_REF_RECURSION,
                cursor.get_usr()
            );
            return TokenKind::None;
        }
        if let Some(referenced) = cursor.get_reference() {
            return classify_identifier(referenced, referenced.get_kind(), depth + 1);
        }
        return TokenKind::None;
    }

    match cursor_kind {
        EntityKind::EnumConstantDecl | EntityKind::NonTypeTemplateParameter => TokenKind::Constant,
        _ if is_function_like(cursor_kind) => TokenKind::Func,
        _ if is_variable_decl(cursor_kind) => classify_variable(cursor),
        EntityKind::ParmDecl => TokenKind::VarLocal,
        _ if is_namespace_like(cursor_kind) => TokenKind::Namesp,
        EntityKind::LabelStmt => TokenKind::Lbl,
        _ if is_attribute(cursor_kind) => TokenKind::Attr,
        _ => TokenKind::None,
    }
}

fn classify_variable(cursor: Entity) -> TokenKind {
    match cursor.get_linkage() {
        None => TokenKind::VarLocal,
        Some(Linkage::NoLinkage) => TokenKind::VarLocal,
        Some(_) => {
            if cursor.get_kind() == EntityKind::FieldDecl {
                // Fields: static storage has no direct linkage query on the
                // member itself in clang's model, so storage class decides.
                if cursor.get_storage_class() == Some(clang::StorageClass::Static) {
                    TokenKind::VarStaticMember
                } else {
                    TokenKind::VarNonstaticMember
                }
            } else {
                TokenKind::VarGlobal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_literal_hex() {
        assert_eq!(int_literal_kind("0x1F"), TokenKind::LitNumIntHex);
    }

    #[test]
    fn int_literal_bin() {
        assert_eq!(int_literal_kind("0b101"), TokenKind::LitNumIntBin);
    }

    #[test]
    fn int_literal_oct() {
        assert_eq!(int_literal_kind("0755"), TokenKind::LitNumIntOct);
    }

    #[test]
    fn int_literal_long() {
        assert_eq!(int_literal_kind("10L"), TokenKind::LitNumIntDecLong);
    }

    #[test]
    fn int_literal_plain() {
        assert_eq!(int_literal_kind("42"), TokenKind::LitNum);
    }

    #[test]
    fn builtin_type_adjectives() {
        assert!(is_builtin_type_spelling("unsigned int"));
        assert!(is_builtin_type_spelling("long"));
        assert!(!is_builtin_type_spelling("MyClass"));
    }

    #[test]
    fn literal_keyword_spellings() {
        assert!(is_literal_keyword_spelling("nullptr"));
        assert!(is_literal_keyword_spelling("true"));
        assert!(!is_literal_keyword_spelling("class"));
    }
}
