use anyhow::Result;

use happynest_core::{
    news::Coordinates,
    storage::Database,
    AppConfig, DigestService, DigestTarget,
};

/// Where to run the digest, as given on the command line
pub struct DigestArgs {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub global: bool,
    pub cities: Option<usize>,
    pub narrate: bool,
}

impl DigestArgs {
    fn target(&self, service: &DigestService) -> DigestTarget {
        if self.global {
            return DigestTarget::Global {
                sample: self.cities.unwrap_or_else(|| service.global_sample_size()),
            };
        }

        let coordinates = self.lat.zip(self.lon).map(|(lat, lon)| Coordinates::new(lat, lon));
        service.target_for(
            self.city.clone(),
            self.state.clone(),
            self.country.clone(),
            coordinates,
        )
    }
}

pub async fn run(db: Database, config: &AppConfig, args: DigestArgs) -> Result<()> {
    let service = DigestService::from_config(config, db)?;
    let target = args.target(&service);

    println!("Running digest...");
    let report = service.run(target, args.narrate).await?;

    println!(
        "Stored {} positive articles for {}:\n",
        report.articles.len(),
        report.locations.join(", ")
    );
    for article in &report.articles {
        println!("  [{}] {}", article.location.city, article.title);
        println!("    {} | {}", article.source, article.id);
    }

    if let Some(path) = &report.audio_path {
        println!(
            "\nNarration: {}",
            config.static_dir().join(path.trim_start_matches("/static/")).display()
        );
    } else if args.narrate {
        println!("\nNo narration produced (speech disabled, failed, or nothing to read).");
    }

    Ok(())
}
