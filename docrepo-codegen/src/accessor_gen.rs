use docrepo::schema::{EntitySchema, FieldDescriptor};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::type_utils::{
    field_const_ident, field_rust_type, is_copy, safe_field_ident, setter_ident, value_conversion,
    TYPE_TAG_CONST,
};

/// Generate the accessor struct of an entity and its `docrepo::Entity` impl.
pub fn generate_accessor(schema: &EntitySchema) -> TokenStream {
    let struct_ident = format_ident!("{}", schema.name);
    let type_tag = &schema.type_tag;
    let type_tag_const = format_ident!("{}", TYPE_TAG_CONST);
    let doc_comment = format!(
        " Accessor for `{}` documents (type tag `{}`).",
        schema.name, schema.type_tag
    );

    let fields: Vec<&FieldDescriptor> = schema.persisted_fields().collect();

    let field_tokens = fields.iter().map(|field| {
        let ident = safe_field_ident(&field.name);
        let ty = field_rust_type(field);
        quote! { #ident: Option<#ty>, }
    });

    let const_tokens = fields.iter().map(|field| {
        let ident = field_const_ident(&field.name);
        let property = &field.store_property;
        quote! { pub const #ident: &str = #property; }
    });

    let method_tokens = fields.iter().map(|field| generate_field_methods(field));
    let entity_impl = generate_entity_impl(schema, &fields);

    quote! {
        #[doc = #doc_comment]
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #struct_ident {
            #(#field_tokens)*
        }

        impl #struct_ident {
            pub const #type_tag_const: &str = #type_tag;
            #(#const_tokens)*

            #(#method_tokens)*
        }

        #entity_impl
    }
}

fn generate_field_methods(field: &FieldDescriptor) -> TokenStream {
    let ident = safe_field_ident(&field.name);
    let setter = setter_ident(&field.name);
    let ty = field_rust_type(field);

    let getter = if is_copy(field) {
        quote! {
            pub fn #ident(&self) -> Option<#ty> {
                self.#ident
            }
        }
    } else {
        quote! {
            pub fn #ident(&self) -> Option<&str> {
                self.#ident.as_deref()
            }
        }
    };

    quote! {
        #getter

        pub fn #setter(&mut self, value: impl Into<Option<#ty>>) -> &mut Self {
            self.#ident = value.into();
            self
        }
    }
}

fn generate_entity_impl(schema: &EntitySchema, fields: &[&FieldDescriptor]) -> TokenStream {
    let struct_ident = format_ident!("{}", schema.name);

    let document_id = match schema.identity().filter(|f| f.is_persisted()) {
        Some(field) if field.binds_native_id() || !is_copy(field) => {
            let ident = safe_field_ident(&field.name);
            quote! { self.#ident.clone() }
        }
        Some(field) => {
            let ident = safe_field_ident(&field.name);
            quote! { self.#ident.map(|value| value.to_string()) }
        }
        None => quote! { None },
    };

    // The native id is carried by the document itself, never as a property.
    let writes = fields.iter().filter(|f| !f.binds_native_id()).map(|field| {
        let ident = safe_field_ident(&field.name);
        let key = field_const_ident(&field.name);
        let (ctor, _) = value_conversion(field);
        let value = if is_copy(field) {
            quote! { *value }
        } else {
            quote! { value.clone() }
        };
        quote! {
            if let Some(value) = &self.#ident {
                properties.insert(Self::#key.to_string(), #ctor(#value));
            }
        }
    });

    let reads = fields.iter().map(|field| {
        let ident = safe_field_ident(&field.name);
        if field.binds_native_id() {
            quote! { #ident: Some(document.id.clone()), }
        } else {
            let key = field_const_ident(&field.name);
            let (_, unbox) = value_conversion(field);
            quote! {
                #ident: document.property(Self::#key).and_then(docrepo::Value::#unbox),
            }
        }
    });

    quote! {
        impl docrepo::Entity for #struct_ident {
            fn document_id(&self) -> Option<String> {
                #document_id
            }

            fn serialize(&self) -> docrepo::Properties {
                #[allow(unused_mut)]
                let mut properties = docrepo::Properties::new();
                #(#writes)*
                properties
            }

            fn unserialize(document: &docrepo::Document) -> Self {
                #struct_ident {
                    #(#reads)*
                }
            }
        }
    }
}
