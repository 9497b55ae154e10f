use anyhow::Result;

use happynest_core::storage::{Database, NewsRepository};

pub async fn run(db: &Database, city: Option<&str>) -> Result<()> {
    let repo = NewsRepository::new(db);
    let articles = match city {
        Some(city) => repo.list_by_city(city).await?,
        None => repo.list_all().await?,
    };

    if articles.is_empty() {
        println!("No articles stored yet.");
        println!("\nTo fetch good news for a city, run:");
        println!("  happynest digest --city <name>");
        return Ok(());
    }

    println!("Articles ({}):\n", articles.len());

    for article in &articles {
        println!("  {} - {}", article.location.city, article.title);
        println!(
            "    {} | {} | {}",
            article.published_at.format("%Y-%m-%d %H:%M"),
            article.source,
            article.id
        );
    }

    Ok(())
}
