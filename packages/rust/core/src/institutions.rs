//! Institution records, geocoded on save when no location is given.

use tracing::{instrument, warn};

use profsite_geocode::Geocoder;
use profsite_shared::{Institution, ProfsiteError, Result};
use profsite_storage::Storage;

/// Validate and store `institution`.
///
/// Without a location, the address parts are geocoded through `geocoder`;
/// a miss leaves the location empty. Passing no geocoder stores the record
/// unplaced.
#[instrument(skip_all, fields(name = %institution.name))]
pub async fn save_institution(
    storage: &Storage,
    geocoder: Option<&Geocoder>,
    mut institution: Institution,
) -> Result<Institution> {
    for (field, value) in [
        ("name", &institution.name),
        ("city", &institution.city),
        ("state", &institution.state),
        ("country", &institution.country),
    ] {
        if value.trim().is_empty() {
            return Err(ProfsiteError::validation(format!(
                "institution {field} must not be empty"
            )));
        }
    }

    if institution.location.is_none() {
        match geocoder {
            Some(geocoder) => {
                institution.location = geocoder
                    .geocode_address(&institution.address_query())
                    .await?;
                if institution.location.is_none() {
                    warn!("address could not be geocoded");
                }
            }
            None => warn!("no geocoder configured, storing without a location"),
        }
    }

    storage.insert_institution(&institution).await?;
    Ok(institution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use profsite_shared::{Point, RecordId};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("profsite_inst_{}.db", uuid::Uuid::now_v7()));
        Storage::open(&tmp).await.unwrap()
    }

    fn dusp() -> Institution {
        Institution {
            id: RecordId::new().to_string(),
            name: "DUSP".into(),
            address: "77 Massachusetts Ave".into(),
            city: "Cambridge".into(),
            state: "MA".into(),
            country: "USA".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_location_is_geocoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode/v1/json"))
            .and(query_param("q", "77 Massachusetts Ave,Cambridge,MA,USA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"geometry": {"lat": 42.3591, "lng": -71.0932}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let geocoder = Geocoder::new(&server.uri(), "k", 5).unwrap();
        let saved = save_institution(&storage, Some(&geocoder), dusp())
            .await
            .unwrap();

        let expected = Some(Point {
            lng: -71.0932,
            lat: 42.3591,
        });
        assert_eq!(saved.location, expected);
        assert_eq!(storage.list_institutions().await.unwrap()[0].location, expected);
    }

    #[tokio::test]
    async fn given_location_skips_geocoding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let geocoder = Geocoder::new(&server.uri(), "k", 5).unwrap();
        let placed = Institution {
            location: Some(Point { lng: 1.0, lat: 2.0 }),
            ..dusp()
        };
        let saved = save_institution(&storage, Some(&geocoder), placed)
            .await
            .unwrap();
        assert_eq!(saved.location, Some(Point { lng: 1.0, lat: 2.0 }));
    }

    #[tokio::test]
    async fn blank_required_field_is_rejected() {
        let storage = test_storage().await;
        let inst = Institution {
            city: " ".into(),
            ..dusp()
        };
        let err = save_institution(&storage, None, inst).await.unwrap_err();
        assert!(err.to_string().contains("city"));
        assert!(storage.list_institutions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_geocoder_stores_unplaced() {
        let storage = test_storage().await;
        let saved = save_institution(&storage, None, dusp()).await.unwrap();
        assert!(saved.location.is_none());
    }
}
