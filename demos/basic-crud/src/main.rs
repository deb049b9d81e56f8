use docrepo::{DocumentStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;

#[allow(dead_code)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/docrepo_generated.rs"));
}

use generated::shop::catalog::proxy::{Category, Product};
use generated::Shop;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let store = match std::env::var("DOCREPO_DB") {
        Ok(path) => {
            log::info!("Opening store at: {path}");
            SqliteStore::open(Path::new(&path))?
        }
        Err(_) => {
            log::info!("DOCREPO_DB not set, using an in-memory store");
            SqliteStore::open_in_memory()?
        }
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let shop = Shop::create(store.clone());
    let categories = shop.category_repository();
    let products = shop.product_repository();

    let mut books = Category::default();
    books.set_name("Books".to_string()).set_position(0);
    let books = categories.try_save(&books)?;
    let books_id = books.id().unwrap_or_default().to_string();
    log::info!("Saved category {books_id}");

    for (position, name) in ["Fiction", "Poetry"].into_iter().enumerate() {
        let mut child = Category::default();
        child
            .set_name(name.to_string())
            .set_parent(books_id.clone())
            .set_position(position as i32);
        categories.try_save(&child)?;
    }

    for (sku, title, stock) in [("B-001", "Dune", 3), ("B-002", "Emma", 0), ("B-003", "Ulysses", 3)] {
        let mut product = Product::default();
        product
            .set_sku(sku.to_string())
            .set_title(title.to_string())
            .set_category(books_id.clone())
            .set_price(12.5)
            .set_stock(stock);
        products.try_save(&product)?;
    }

    println!("All categories:");
    for category in categories.try_find_all()? {
        println!("  {:?} (parent {:?})", category.name(), category.parent());
    }

    let children = categories.try_find_by_parent(&books_id)?;
    println!("Children of Books: {}", children.len());

    if let Some(poetry) = categories.try_find_one_by_parent_and_position(&books_id, 1)? {
        println!("Second child: {:?}", poetry.name());
    }

    let in_stock = products.try_find_by_category_and_stock(&books_id, 3)?;
    println!("Books with 3 in stock:");
    for product in &in_stock {
        println!("  {:?} {:?}", product.sku(), product.title());
    }

    if let Some(emma) = products.try_find_one_by_sku("B-002")? {
        let deleted = products.try_delete(&emma)?;
        println!("Deleted sold-out {:?}: {deleted}", emma.title());
    }
    println!("Products left: {}", products.try_find_all()?.len());

    // Compatibility finders collapse store errors into empty results
    let missing = categories.find_one_by_name("Music");
    println!("Music category present: {}", missing.is_some());

    Ok(())
}
