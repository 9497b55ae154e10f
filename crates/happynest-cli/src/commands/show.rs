use anyhow::{bail, Context, Result};
use uuid::Uuid;

use happynest_core::storage::{Database, NewsRepository};

pub async fn run(db: &Database, id: &str) -> Result<()> {
    let id = Uuid::parse_str(id).with_context(|| format!("Invalid article id '{}'", id))?;

    match NewsRepository::new(db).find_by_id(id).await? {
        Some(article) => {
            println!("{}", serde_json::to_string_pretty(&article)?);
            Ok(())
        }
        None => bail!("News article not found: {}", id),
    }
}
