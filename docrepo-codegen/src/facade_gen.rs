use docrepo::schema::EntitySchema;
use docrepo::{EngineConfig, ViewLifecycle};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::type_utils::{repository_accessor_name, repository_struct_name, safe_field_ident};

/// Generate the facade owning one repository per entity, in the order given.
pub fn generate_facade(name: &str, entities: &[EntitySchema], engine: &EngineConfig) -> TokenStream {
    let facade_ident = format_ident!("{}", name);

    let repo_paths: Vec<TokenStream> = entities
        .iter()
        .map(|entity| {
            let segments = entity.module_path().into_iter().map(|s| safe_field_ident(&s));
            let repo_ident = format_ident!("{}", repository_struct_name(&entity.name));
            quote! { self::#(#segments::)*#repo_ident }
        })
        .collect();
    let field_idents: Vec<_> = entities
        .iter()
        .map(|entity| format_ident!("{}", repository_accessor_name(&entity.name)))
        .collect();

    let engine_config = generate_engine_config(engine);

    quote! {
        /// Entry point wiring a document store to every generated repository.
        pub struct #facade_ident {
            #(#field_idents: #repo_paths,)*
        }

        impl #facade_ident {
            pub fn new(#(#field_idents: #repo_paths),*) -> Self {
                #facade_ident {
                    #(#field_idents,)*
                }
            }

            /// Open every repository on `store` with the schema's engine settings.
            pub fn create(store: std::sync::Arc<dyn docrepo::DocumentStore>) -> Self {
                Self::create_with_config(store, Self::engine_config())
            }

            #[allow(unused_variables)]
            pub fn create_with_config(
                store: std::sync::Arc<dyn docrepo::DocumentStore>,
                config: docrepo::EngineConfig,
            ) -> Self {
                Self::new(#(#repo_paths::with_config(store.clone(), config.clone())),*)
            }

            /// Engine settings declared in the schema.
            pub fn engine_config() -> docrepo::EngineConfig {
                #engine_config
            }

            #(
                pub fn #field_idents(&self) -> &#repo_paths {
                    &self.#field_idents
                }
            )*
        }
    }
}

fn generate_engine_config(engine: &EngineConfig) -> TokenStream {
    let discriminator = &engine.discriminator;
    let lifecycle = match engine.view_lifecycle {
        ViewLifecycle::Retain => quote! { docrepo::ViewLifecycle::Retain },
        ViewLifecycle::Drop => quote! { docrepo::ViewLifecycle::Drop },
    };
    quote! {
        docrepo::EngineConfig {
            discriminator: #discriminator.to_string(),
            view_lifecycle: #lifecycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(tokens: TokenStream) -> String {
        let file: syn::File = syn::parse2(tokens).expect("facade tokens should parse");
        prettyplease::unparse(&file)
    }

    #[test]
    fn test_facade_in_discovery_order() {
        let entities = vec![
            EntitySchema::builder("Product", "product").package("shop").build().unwrap(),
            EntitySchema::builder("Category", "category").build().unwrap(),
        ];
        let code = render(generate_facade("Database", &entities, &EngineConfig::default()));

        assert!(code.contains("pub struct Database"));
        assert!(code.contains("product_repository: self::shop::proxy::ProductRepository"));
        assert!(code.contains("category_repository: self::proxy::CategoryRepository"));
        let product = code.find("product_repository").unwrap();
        let category = code.find("category_repository").unwrap();
        assert!(product < category);
        assert!(code.contains("pub fn category_repository(&self)"));
    }

    #[test]
    fn test_engine_config_is_embedded() {
        let engine = EngineConfig {
            discriminator: "kind".into(),
            view_lifecycle: ViewLifecycle::Drop,
        };
        let code = render(generate_facade("Db", &[], &engine));
        assert!(code.contains("discriminator: \"kind\".to_string()"));
        assert!(code.contains("docrepo::ViewLifecycle::Drop"));
    }
}
