use docrepo::schema::{EntitySchema, FinderSpec};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::type_utils::{
    field_const_ident, finder_param_type, repository_struct_name, safe_field_ident,
};

/// Generate `<Name>Repository`: a typed wrapper over `docrepo::Repository`
/// carrying one finder per derived [`FinderSpec`].
pub fn generate_repository(schema: &EntitySchema, finders: &[FinderSpec]) -> TokenStream {
    let entity_ident = format_ident!("{}", schema.name);
    let repo_ident = format_ident!("{}", repository_struct_name(&schema.name));
    let doc_comment = format!(" Typed finders and CRUD for [`{}`].", schema.name);

    let finder_tokens = finders
        .iter()
        .map(|finder| generate_finder(&entity_ident, finder));

    quote! {
        #[doc = #doc_comment]
        pub struct #repo_ident {
            inner: docrepo::Repository<#entity_ident>,
        }

        impl #repo_ident {
            pub fn new(store: std::sync::Arc<dyn docrepo::DocumentStore>) -> Self {
                Self::with_config(store, docrepo::EngineConfig::default())
            }

            pub fn with_config(
                store: std::sync::Arc<dyn docrepo::DocumentStore>,
                config: docrepo::EngineConfig,
            ) -> Self {
                #repo_ident {
                    inner: docrepo::Repository::with_config(store, #entity_ident::TYPE_TAG, config),
                }
            }

            #(#finder_tokens)*
        }

        impl std::ops::Deref for #repo_ident {
            type Target = docrepo::Repository<#entity_ident>;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }
    }
}

/// One finder plus its `try_` twin that surfaces store errors.
fn generate_finder(entity_ident: &proc_macro2::Ident, finder: &FinderSpec) -> TokenStream {
    let method = format_ident!("{}", finder.method_name);
    let try_method = format_ident!("try_{}", finder.method_name);

    let params: Vec<TokenStream> = finder
        .fields
        .iter()
        .map(|field| {
            let ident = safe_field_ident(&field.name);
            let ty = finder_param_type(field);
            quote! { #ident: #ty }
        })
        .collect();

    let pairs: Vec<TokenStream> = finder
        .fields
        .iter()
        .map(|field| {
            let ident = safe_field_ident(&field.name);
            let key = field_const_ident(&field.name);
            quote! { .with(#entity_ident::#key, #ident) }
        })
        .collect();
    let predicate = quote! { &docrepo::Predicate::new() #(#pairs)* };

    if finder.unique {
        quote! {
            pub fn #method(&self, #(#params),*) -> Option<#entity_ident> {
                self.inner.find_one_by_predicate(#predicate)
            }

            pub fn #try_method(&self, #(#params),*) -> docrepo::Result<Option<#entity_ident>> {
                self.inner.try_find_one_by(#predicate)
            }
        }
    } else {
        quote! {
            pub fn #method(&self, #(#params),*) -> Vec<#entity_ident> {
                self.inner.find_by_predicate(#predicate)
            }

            pub fn #try_method(&self, #(#params),*) -> docrepo::Result<Vec<#entity_ident>> {
                self.inner.try_find_by(#predicate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo::schema::{FieldDescriptor, FieldType, IndexDescriptor};

    fn product() -> EntitySchema {
        EntitySchema::builder("Product", "product")
            .field(FieldDescriptor::new("id", FieldType::String).property("_id"))
            .field(FieldDescriptor::new("sku", FieldType::String).indexed(true))
            .field(FieldDescriptor::new("category", FieldType::String).indexed(false))
            .field(FieldDescriptor::new("price", FieldType::Double))
            .index(IndexDescriptor::new(["sku"]).unique())
            .index(IndexDescriptor::new(["category", "price"]))
            .build()
            .unwrap()
    }

    fn render(schema: &EntitySchema) -> String {
        let tokens = generate_repository(schema, &schema.finders());
        let file: syn::File = syn::parse2(tokens).expect("repository tokens should parse");
        prettyplease::unparse(&file)
    }

    #[test]
    fn test_finder_shapes() {
        let code = render(&product());
        assert!(code.contains("pub fn find_one_by_sku(&self, sku: &str) -> Option<Product>"));
        assert!(code.contains("pub fn find_by_category(&self, category: &str) -> Vec<Product>"));
        assert!(code.contains("pub fn find_by_category_and_price("));
        assert!(code.contains("price: f64"));
        assert!(code.contains("-> docrepo::Result<Option<Product>>"));
    }

    #[test]
    fn test_duplicate_finder_emitted_once() {
        let code = render(&product());
        assert_eq!(code.matches("pub fn find_one_by_sku(").count(), 1);
        assert_eq!(code.matches("pub fn try_find_one_by_sku(").count(), 1);
    }

    #[test]
    fn test_composite_predicate_uses_store_keys() {
        let code = render(&product());
        assert!(code.contains(".with(Product::CATEGORY, category)"));
        assert!(code.contains(".with(Product::PRICE, price)"));
    }

    #[test]
    fn test_repository_without_finders() {
        let schema = EntitySchema::builder("Note", "note")
            .field(FieldDescriptor::new("body", FieldType::String))
            .build()
            .unwrap();
        let code = render(&schema);
        assert!(code.contains("pub struct NoteRepository"));
        assert!(code.contains("impl std::ops::Deref for NoteRepository"));
        assert!(!code.contains("find_"));
    }
}
