use docrepo::schema::{FieldDescriptor, FieldType};
use heck::{ToShoutySnakeCase, ToSnakeCase};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

/// Accessor constant holding the entity's type tag.
pub const TYPE_TAG_CONST: &str = "TYPE_TAG";

/// Name of the generated repository for an accessor.
/// e.g. "Category" -> "CategoryRepository"
pub fn repository_struct_name(entity_name: &str) -> String {
    format!("{entity_name}Repository")
}

/// Name of the facade field and accessor method for a repository.
/// e.g. "ProductVariant" -> "product_variant_repository"
pub fn repository_accessor_name(entity_name: &str) -> String {
    format!("{}_repository", entity_name.to_snake_case())
}

/// Name of the store-property constant of a field.
/// e.g. "firstName" -> "FIRST_NAME"
pub fn field_const_ident(field_name: &str) -> Ident {
    format_ident!("{}", field_name.to_shouty_snake_case())
}

pub fn setter_ident(field_name: &str) -> Ident {
    format_ident!("set_{}", field_name.to_snake_case())
}

/// Rust type held by an accessor field, without the `Option`.
pub fn field_rust_type(field: &FieldDescriptor) -> TokenStream {
    if field.binds_native_id() {
        return quote! { String };
    }
    match field.field_type {
        FieldType::Byte => quote! { i8 },
        FieldType::Short => quote! { i16 },
        FieldType::Int => quote! { i32 },
        FieldType::Long => quote! { i64 },
        FieldType::Float => quote! { f32 },
        FieldType::Double => quote! { f64 },
        FieldType::Char => quote! { char },
        FieldType::String | FieldType::Entity => quote! { String },
    }
}

/// True for types handed out by value from getters.
pub fn is_copy(field: &FieldDescriptor) -> bool {
    !field.binds_native_id() && !matches!(field.field_type, FieldType::String | FieldType::Entity)
}

/// Constructor turning a field value into a store value, and the unboxing
/// method reading it back.
/// e.g. int -> (`docrepo::Value::Int`, `as_int`)
pub fn value_conversion(field: &FieldDescriptor) -> (TokenStream, Ident) {
    let (variant, unbox) = if field.binds_native_id() {
        ("String", "as_string")
    } else {
        match field.field_type {
            FieldType::Byte => ("Byte", "as_byte"),
            FieldType::Short => ("Short", "as_short"),
            FieldType::Int => ("Int", "as_int"),
            FieldType::Long => ("Long", "as_long"),
            FieldType::Float => ("Float", "as_float"),
            FieldType::Double => ("Double", "as_double"),
            FieldType::Char => ("Char", "as_char"),
            FieldType::String | FieldType::Entity => ("String", "as_string"),
        }
    };
    let variant = format_ident!("{}", variant);
    (quote! { docrepo::Value::#variant }, format_ident!("{}", unbox))
}

/// Parameter type of a finder argument for this field.
pub fn finder_param_type(field: &FieldDescriptor) -> TokenStream {
    if is_copy(field) {
        field_rust_type(field)
    } else {
        quote! { &str }
    }
}

/// Identifier for a field, method or module name, escaping Rust keywords.
pub fn safe_field_ident(name: &str) -> Ident {
    let snake = name.to_snake_case();
    match snake.as_str() {
        // Cannot be raw identifiers
        "self" | "super" | "crate" => format_ident!("{}_", snake),
        "type" | "struct" | "enum" | "fn" | "let" | "mut" | "ref" | "mod" | "use" | "pub"
        | "impl" | "trait" | "for" | "loop" | "while" | "if" | "else" | "match" | "return"
        | "break" | "continue" | "as" | "in" | "where" | "async" | "await" | "dyn" | "move"
        | "static" | "const" | "unsafe" | "extern" | "true" | "false" | "abstract" | "become"
        | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof" | "unsized"
        | "virtual" | "yield" | "try" | "gen" => format_ident!("r#{}", snake),
        _ => format_ident!("{}", snake),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_names() {
        assert_eq!(repository_struct_name("Category"), "CategoryRepository");
        assert_eq!(
            repository_accessor_name("ProductVariant"),
            "product_variant_repository"
        );
    }

    #[test]
    fn test_field_const_ident() {
        assert_eq!(field_const_ident("firstName").to_string(), "FIRST_NAME");
        assert_eq!(field_const_ident("id").to_string(), "ID");
        assert_eq!(setter_ident("firstName").to_string(), "set_first_name");
    }

    #[test]
    fn test_native_id_is_always_string() {
        let id = FieldDescriptor::new("id", FieldType::Long).property("_id");
        assert_eq!(field_rust_type(&id).to_string(), "String");
        assert!(!is_copy(&id));
        let (ctor, unbox) = value_conversion(&id);
        assert_eq!(ctor.to_string(), "docrepo :: Value :: String");
        assert_eq!(unbox.to_string(), "as_string");
    }

    #[test]
    fn test_primitive_conversions() {
        let x = FieldDescriptor::new("x", FieldType::Short);
        assert_eq!(field_rust_type(&x).to_string(), "i16");
        assert_eq!(finder_param_type(&x).to_string(), "i16");
        assert_eq!(value_conversion(&x).1.to_string(), "as_short");

        let name = FieldDescriptor::new("name", FieldType::String);
        assert_eq!(finder_param_type(&name).to_string(), "& str");
    }

    #[test]
    fn test_safe_field_ident() {
        assert_eq!(safe_field_ident("type").to_string(), "r#type");
        assert_eq!(safe_field_ident("self").to_string(), "self_");
        assert_eq!(safe_field_ident("firstName").to_string(), "first_name");
    }
}
