use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::assembler::{ClassifiedStory, FeedAssembler, NarrationScript};
use super::cities::{sample_cities, CITY_CATALOG};
use crate::ai::{completion_model, ContentClassifier, OpenAiSpeech, SpeechSynthesizer};
use crate::config::{AppConfig, DigestConfig, NewsConfig};
use crate::geo::{Geocoder, NominatimGeocoder};
use crate::news::{
    remove_duplicates, AylienClient, Coordinates, Location, NewsArticle, StoryFetcher, StoryQuery,
};
use crate::retry::RetryPolicy;
use crate::storage::Database;
use crate::{Error, Result};

/// An explicitly named place to digest
#[derive(Debug, Clone, Default)]
pub struct CityRequest {
    pub city: String,
    pub state: Option<String>,
    pub country: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// Where a digest run should look for news
#[derive(Debug, Clone)]
pub enum DigestTarget {
    City(CityRequest),
    /// Reverse-geocoded to the nearest city
    Coordinates(Coordinates),
    /// Random sample from the built-in catalog
    Global { sample: usize },
}

/// Outcome of one digest run
#[derive(Debug, Clone, Serialize)]
pub struct DigestReport {
    pub locations: Vec<String>,
    pub articles: Vec<NewsArticle>,
    /// URL path of the narrated digest, when one was produced
    pub audio_path: Option<String>,
}

/// Fetch, dedupe, classify and persist good news for one or more places
pub struct DigestService {
    db: Database,
    fetcher: StoryFetcher,
    classifier: ContentClassifier,
    geocoder: Arc<dyn Geocoder>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    news: NewsConfig,
    digest: DigestConfig,
    default_city: String,
    static_dir: PathBuf,
}

impl DigestService {
    pub fn new(
        config: &AppConfig,
        db: Database,
        fetcher: StoryFetcher,
        classifier: ContentClassifier,
        geocoder: Arc<dyn Geocoder>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            db,
            fetcher,
            classifier,
            geocoder,
            speech,
            news: config.news.clone(),
            digest: config.digest.clone(),
            default_city: config.geocoder.default_city.clone(),
            static_dir: config.static_dir(),
        }
    }

    /// Wire up the production collaborators from configuration
    pub fn from_config(config: &AppConfig, db: Database) -> Result<Self> {
        let source = Arc::new(AylienClient::new(&config.news)?);
        let fetcher = StoryFetcher::new(source, RetryPolicy::upstream(&config.news));
        let classifier = ContentClassifier::new(completion_model(&config.ai)?);
        let geocoder = Arc::new(NominatimGeocoder::new(&config.geocoder)?);

        let speech: Option<Arc<dyn SpeechSynthesizer>> = if config.speech.enabled {
            Some(Arc::new(OpenAiSpeech::new(
                &config.speech,
                config.ai.api_key.as_deref(),
            )?))
        } else {
            None
        };

        Ok(Self::new(config, db, fetcher, classifier, geocoder, speech))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Cities sampled by a global digest unless the caller says otherwise
    pub fn global_sample_size(&self) -> usize {
        self.digest.global_sample_size
    }

    /// The configured default city, with catalog details when it is listed
    pub fn default_target(&self) -> DigestTarget {
        let request = CITY_CATALOG
            .iter()
            .find(|entry| entry.city.eq_ignore_ascii_case(&self.default_city))
            .map(|entry| {
                let location = entry.location();
                CityRequest {
                    city: location.city,
                    state: location.state,
                    country: location.country,
                    coordinates: Some(location.coordinates),
                }
            })
            .unwrap_or_else(|| CityRequest {
                city: self.default_city.clone(),
                ..CityRequest::default()
            });
        DigestTarget::City(request)
    }

    /// Resolve loosely given place parts: a non-blank city wins, then
    /// coordinates, then the default city
    pub fn target_for(
        &self,
        city: Option<String>,
        state: Option<String>,
        country: Option<String>,
        coordinates: Option<Coordinates>,
    ) -> DigestTarget {
        match (city.filter(|c| !c.trim().is_empty()), coordinates) {
            (Some(city), coordinates) => DigestTarget::City(CityRequest {
                city,
                state,
                country,
                coordinates,
            }),
            (None, Some(coordinates)) => DigestTarget::Coordinates(coordinates),
            (None, None) => self.default_target(),
        }
    }

    /// Run one digest; persisted articles survive a failed narration
    pub async fn run(&self, target: DigestTarget, narrate: bool) -> Result<DigestReport> {
        let global = matches!(target, DigestTarget::Global { .. });
        let locations = self.resolve(target).await?;

        let mut sections: Vec<(String, Vec<String>)> = Vec::with_capacity(locations.len());
        let mut articles = Vec::new();

        for location in &locations {
            let stored = self.digest_location(location).await?;
            sections.push((
                location.city.clone(),
                stored.iter().map(|a| a.title.clone()).collect(),
            ));
            articles.extend(stored);
        }

        let audio_path = if narrate {
            let limit = self.digest.narration_max_titles;
            let script = if global {
                NarrationScript::global(&sections, limit)
            } else {
                let (place, titles): (&str, &[String]) = match sections.first() {
                    Some((place, titles)) => (place.as_str(), titles.as_slice()),
                    None => (self.default_city.as_str(), &[]),
                };
                NarrationScript::for_location(place, titles, limit)
            };
            self.narrate(&script, articles.is_empty()).await
        } else {
            None
        };

        Ok(DigestReport {
            locations: locations.into_iter().map(|l| l.city).collect(),
            articles,
            audio_path,
        })
    }

    async fn resolve(&self, target: DigestTarget) -> Result<Vec<Location>> {
        match target {
            DigestTarget::City(request) => {
                let city = request.city.trim();
                if city.is_empty() {
                    return Err(Error::InvalidInput("city must not be empty".to_string()));
                }
                Ok(vec![Location {
                    city: city.to_string(),
                    state: request.state,
                    country: request.country,
                    coordinates: request.coordinates.unwrap_or_default(),
                }])
            }
            DigestTarget::Coordinates(coords) => Ok(vec![self.locate(coords).await]),
            DigestTarget::Global { sample } => {
                if sample == 0 {
                    return Err(Error::InvalidInput(
                        "global digest needs at least one city".to_string(),
                    ));
                }
                let cities = sample_cities(&mut rand::thread_rng(), sample);
                Ok(cities)
            }
        }
    }

    /// Reverse geocode, falling back to the default city
    async fn locate(&self, coords: Coordinates) -> Location {
        match self.geocoder.reverse(coords).await {
            Ok(Some(place)) => Location {
                city: place.city,
                state: place.state,
                country: place.country,
                coordinates: coords,
            },
            Ok(None) => {
                tracing::warn!(
                    lat = coords.lat,
                    lon = coords.lon,
                    "No city found for coordinates, using {}",
                    self.default_city
                );
                self.default_location(coords)
            }
            Err(e) => {
                tracing::warn!(
                    lat = coords.lat,
                    lon = coords.lon,
                    "Reverse geocoding failed, using {}: {}",
                    self.default_city,
                    e
                );
                self.default_location(coords)
            }
        }
    }

    fn default_location(&self, coords: Coordinates) -> Location {
        Location {
            coordinates: coords,
            ..Location::city(self.default_city.clone())
        }
    }

    async fn digest_location(&self, location: &Location) -> Result<Vec<NewsArticle>> {
        let query = StoryQuery::for_city(&location.city, &self.news);
        let stories = self
            .fetcher
            .fetch_top_stories(&query, Some(self.news.max_stories))
            .await;
        let fetched = stories.len();

        let stories = remove_duplicates(stories, self.digest.dedup_threshold);
        tracing::info!(
            city = %location.city,
            fetched,
            unique = stories.len(),
            "Classifying stories"
        );

        let mut classified = Vec::with_capacity(stories.len());
        for story in stories {
            match self.classifier.classify(story.classification_text()).await {
                Ok(sentiment) => classified.push(ClassifiedStory { story, sentiment }),
                Err(e) => {
                    tracing::warn!("Skipping story '{}': {}", story.title, e);
                }
            }
        }

        FeedAssembler::new(&self.db)
            .assemble(location, classified)
            .await
    }

    /// Synthesize and store the script; `None` on any failure
    async fn narrate(&self, script: &NarrationScript, nothing_to_say: bool) -> Option<String> {
        let Some(speech) = &self.speech else {
            tracing::debug!("Narration requested but speech is not configured");
            return None;
        };
        if nothing_to_say {
            tracing::info!("No positive articles to narrate");
            return None;
        }

        let audio = match speech.synthesize(&script.text()).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!("Speech synthesis failed: {}", e);
                return None;
            }
        };

        let file_name = format!("digest-{}.mp3", Uuid::new_v4());
        let path = self.static_dir.join(&file_name);
        let written: std::io::Result<()> = async {
            tokio::fs::create_dir_all(&self.static_dir).await?;
            tokio::fs::write(&path, &audio).await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::info!("Digest audio written to {}", path.display());
                Some(format!("/static/{}", file_name))
            }
            Err(e) => {
                tracing::warn!("Failed to write digest audio {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::ai::CompletionModel;
    use crate::geo::Place;
    use crate::news::{Sentiment, Story, StoryPage, StorySource};
    use crate::storage::NewsRepository;

    fn story(title: &str) -> Story {
        Story {
            title: title.to_string(),
            body: format!("{} in detail", title),
            published_at: None,
            permalink: None,
            source_name: Some("Stub Wire".to_string()),
        }
    }

    /// One page per city; the page content depends on the queried entity
    struct CitySource;

    #[async_trait::async_trait]
    impl StorySource for CitySource {
        async fn page(&self, query: &StoryQuery, _cursor: Option<&str>) -> Result<StoryPage> {
            Ok(StoryPage {
                stories: vec![
                    story(&format!("Happy volunteers repaint {} school", query.entity)),
                    story(&format!("Happy volunteers repaint {} school!", query.entity)),
                    story(&format!("Senator cuts ribbon in {}", query.entity)),
                    story(&format!("Flooding closes {} roads", query.entity)),
                    story(&format!("Broken model on {} story", query.entity)),
                ],
                next_cursor: None,
            })
        }
    }

    /// Upbeat for "Happy" and "Senator", political for "Senator", fails on "Broken"
    struct KeywordModel;

    #[async_trait::async_trait]
    impl CompletionModel for KeywordModel {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            if prompt.contains("Broken") {
                return Err(Error::AiProvider("HTTP 500".to_string()));
            }
            let political = prompt.contains("Senator");
            if system.contains("sentiment") {
                let upbeat = prompt.contains("Happy") || political;
                Ok(if upbeat { "Positive" } else { "negative" }.to_string())
            } else {
                Ok(if political { "Yes" } else { "No" }.to_string())
            }
        }
    }

    struct FixedGeocoder(Option<Place>);

    #[async_trait::async_trait]
    impl Geocoder for FixedGeocoder {
        async fn reverse(&self, _coords: Coordinates) -> Result<Option<Place>> {
            Ok(self.0.clone())
        }
    }

    struct FailingGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for FailingGeocoder {
        async fn reverse(&self, _coords: Coordinates) -> Result<Option<Place>> {
            Err(Error::Geocode("service unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSpeech {
        scripts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SpeechSynthesizer for RecordingSpeech {
        async fn synthesize(&self, script: &str) -> Result<Bytes> {
            self.scripts.lock().unwrap().push(script.to_string());
            if self.fail {
                return Err(Error::Speech("quota exceeded".to_string()));
            }
            Ok(Bytes::from_static(b"ID3 fake mp3"))
        }
    }

    struct Harness {
        service: DigestService,
        speech: Arc<RecordingSpeech>,
        _data_dir: tempfile::TempDir,
    }

    async fn harness(geocoder: Arc<dyn Geocoder>, speech: RecordingSpeech) -> Harness {
        let data_dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.general.data_dir = data_dir.path().to_path_buf();

        let db = Database::new_in_memory().await.unwrap();
        let fetcher = StoryFetcher::new(Arc::new(CitySource), RetryPolicy::default());
        let classifier = ContentClassifier::new(Arc::new(KeywordModel));
        let speech = Arc::new(speech);

        let service = DigestService::new(
            &config,
            db,
            fetcher,
            classifier,
            geocoder,
            Some(speech.clone()),
        );
        Harness {
            service,
            speech,
            _data_dir: data_dir,
        }
    }

    fn city(name: &str) -> DigestTarget {
        DigestTarget::City(CityRequest {
            city: name.to_string(),
            state: Some("Oregon".to_string()),
            country: Some("United States".to_string()),
            coordinates: None,
        })
    }

    #[tokio::test]
    async fn test_city_digest_persists_only_positive_apolitical_stories() {
        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;

        let report = h.service.run(city("Portland"), false).await.unwrap();

        assert_eq!(report.locations, vec!["Portland"]);
        assert_eq!(report.articles.len(), 1);
        let article = &report.articles[0];
        assert_eq!(article.title, "Happy volunteers repaint Portland school");
        assert_eq!(article.sentiment, Sentiment::Positive);
        assert_eq!(article.source, "Stub Wire");
        assert_eq!(article.location.state.as_deref(), Some("Oregon"));
        assert_eq!(article.location.coordinates, Coordinates::default());
        assert!(report.audio_path.is_none());
        assert!(h.speech.scripts.lock().unwrap().is_empty());

        let stored = NewsRepository::new(h.service.database())
            .list_by_city("Portland")
            .await
            .unwrap();
        assert_eq!(stored, report.articles);
    }

    #[tokio::test]
    async fn test_narration_writes_audio_under_static_dir() {
        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;

        let report = h.service.run(city("Portland"), true).await.unwrap();

        let audio_path = report.audio_path.unwrap();
        let file_name = audio_path.strip_prefix("/static/").unwrap();
        let on_disk = h.service.static_dir.join(file_name);
        assert_eq!(std::fs::read(on_disk).unwrap(), b"ID3 fake mp3");

        let scripts = h.speech.scripts.lock().unwrap();
        let lines: Vec<&str> = scripts[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Portland"));
        assert_eq!(lines[1], "Happy volunteers repaint Portland school");
    }

    #[tokio::test]
    async fn test_speech_failure_keeps_articles() {
        let speech = RecordingSpeech {
            fail: true,
            ..Default::default()
        };
        let h = harness(Arc::new(FixedGeocoder(None)), speech).await;

        let report = h.service.run(city("Portland"), true).await.unwrap();

        assert!(report.audio_path.is_none());
        assert_eq!(report.articles.len(), 1);
        assert_eq!(
            NewsRepository::new(h.service.database()).count().await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_coordinates_are_reverse_geocoded() {
        let place = Place {
            city: "Austin".to_string(),
            state: Some("Texas".to_string()),
            country: Some("United States".to_string()),
        };
        let h = harness(Arc::new(FixedGeocoder(Some(place))), RecordingSpeech::default()).await;
        let coords = Coordinates::new(30.2672, -97.7431);

        let report = h
            .service
            .run(DigestTarget::Coordinates(coords), false)
            .await
            .unwrap();

        assert_eq!(report.locations, vec!["Austin"]);
        assert_eq!(report.articles[0].location.state.as_deref(), Some("Texas"));
        assert_eq!(report.articles[0].location.coordinates, coords);
    }

    #[tokio::test]
    async fn test_geocoding_failure_falls_back_to_default_city() {
        let h = harness(Arc::new(FailingGeocoder), RecordingSpeech::default()).await;

        let report = h
            .service
            .run(DigestTarget::Coordinates(Coordinates::new(1.0, 2.0)), false)
            .await
            .unwrap();
        assert_eq!(report.locations, vec!["New York"]);

        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;
        let report = h
            .service
            .run(DigestTarget::Coordinates(Coordinates::new(1.0, 2.0)), false)
            .await
            .unwrap();
        assert_eq!(report.locations, vec!["New York"]);
        assert_eq!(report.articles[0].location.coordinates, Coordinates::new(1.0, 2.0));
    }

    #[tokio::test]
    async fn test_global_digest_covers_each_sampled_city() {
        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;

        let report = h
            .service
            .run(DigestTarget::Global { sample: 3 }, true)
            .await
            .unwrap();

        assert_eq!(report.locations.len(), 3);
        assert_eq!(report.articles.len(), 3);
        for (city, article) in report.locations.iter().zip(&report.articles) {
            assert_eq!(&article.location.city, city);
            assert_ne!(article.location.coordinates, Coordinates::default());
        }

        let scripts = h.speech.scripts.lock().unwrap();
        for city in &report.locations {
            assert!(scripts[0].contains(&format!("From {}:", city)));
        }
        assert!(report.audio_path.is_some());
    }

    #[tokio::test]
    async fn test_default_target_uses_catalog_details() {
        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;

        let report = h.service.run(h.service.default_target(), false).await.unwrap();

        assert_eq!(report.locations, vec!["New York"]);
        let location = &report.articles[0].location;
        assert_eq!(location.state.as_deref(), Some("New York"));
        assert_eq!(location.country.as_deref(), Some("United States"));
        assert_eq!(location.coordinates, Coordinates::new(40.7128, -74.0060));
    }

    #[tokio::test]
    async fn test_target_for_prefers_city_then_coordinates() {
        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;
        let coords = Coordinates::new(45.5, -122.6);

        let target = h.service.target_for(
            Some("Portland".to_string()),
            Some("Oregon".to_string()),
            None,
            Some(coords),
        );
        match target {
            DigestTarget::City(request) => {
                assert_eq!(request.city, "Portland");
                assert_eq!(request.state.as_deref(), Some("Oregon"));
                assert_eq!(request.coordinates, Some(coords));
            }
            other => panic!("expected a city target, got {:?}", other),
        }

        let target = h.service.target_for(Some("  ".to_string()), None, None, Some(coords));
        assert!(matches!(target, DigestTarget::Coordinates(c) if c == coords));

        match h.service.target_for(None, None, None, None) {
            DigestTarget::City(request) => assert_eq!(request.city, "New York"),
            other => panic!("expected the default city, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_targets() {
        let h = harness(Arc::new(FixedGeocoder(None)), RecordingSpeech::default()).await;

        assert!(matches!(
            h.service.run(city("  "), false).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.run(DigestTarget::Global { sample: 0 }, false).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
