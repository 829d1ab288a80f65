//! People records: the site owner and everyone else the site mentions.

use tracing::{info, instrument};
use url::Url;

use profsite_markdown::slugify;
use profsite_shared::{Person, ProfsiteError, RecordId, Result};
use profsite_storage::Storage;

/// Maximum number of name words kept in a person slug.
const SLUG_WORDS: usize = 8;

/// Fields for a new person; optional ones may be left empty.
#[derive(Debug, Clone, Default)]
pub struct NewPerson {
    pub first: String,
    pub middle: String,
    pub last: String,
    pub email: String,
    pub website: String,
    pub orcid: String,
    pub bio: String,
}

/// Validate and store a person, deriving a unique slug from the full name.
#[instrument(skip_all, fields(first = %new.first, last = %new.last))]
pub async fn add_person(storage: &Storage, new: NewPerson) -> Result<Person> {
    let NewPerson {
        first,
        middle,
        last,
        email,
        website,
        orcid,
        bio,
    } = new;

    if first.trim().is_empty() || last.trim().is_empty() {
        return Err(ProfsiteError::validation(
            "a person needs both a first and a last name",
        ));
    }
    let email = email.trim().to_string();
    if !email.is_empty() && !looks_like_email(&email) {
        return Err(ProfsiteError::validation(format!("invalid email '{email}'")));
    }
    let website = website.trim().to_string();
    if !website.is_empty() {
        let ok = Url::parse(&website).is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
        if !ok {
            return Err(ProfsiteError::validation(format!(
                "invalid website '{website}': expected an http(s) URL"
            )));
        }
    }
    let orcid = orcid.trim().to_uppercase();
    if !orcid.is_empty() && !is_orcid(&orcid) {
        return Err(ProfsiteError::validation(format!(
            "invalid ORCID '{orcid}': expected 0000-0000-0000-000X"
        )));
    }

    let mut person = Person {
        id: RecordId::new().to_string(),
        first: first.trim().to_string(),
        middle: middle.trim().to_string(),
        last: last.trim().to_string(),
        email,
        website,
        orcid,
        bio,
        slug: String::new(),
    };
    let base = slugify(&person.full_name(), SLUG_WORDS);
    if base.is_empty() {
        return Err(ProfsiteError::validation(format!(
            "name '{}' has no letters or digits to build a slug from",
            person.full_name()
        )));
    }
    person.slug = unique_slug(storage, &base).await?;

    storage.insert_person(&person).await?;
    info!(id = %person.id, slug = %person.slug, "person added");
    Ok(person)
}

async fn unique_slug(storage: &Storage, base: &str) -> Result<String> {
    if storage.get_person_by_slug(base).await?.is_none() {
        return Ok(base.to_string());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if storage.get_person_by_slug(&candidate).await?.is_none() {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    }
}

/// Four dash-separated groups of four digits; the final character may be `X`.
fn is_orcid(orcid: &str) -> bool {
    let groups: Vec<&str> = orcid.split('-').collect();
    groups.len() == 4
        && groups.iter().enumerate().all(|(i, g)| {
            g.len() == 4
                && g.chars().enumerate().all(|(j, c)| {
                    c.is_ascii_digit() || (i == 3 && j == 3 && c == 'X')
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("profsite_people_{}.db", uuid::Uuid::now_v7()));
        Storage::open(&tmp).await.unwrap()
    }

    fn ada() -> NewPerson {
        NewPerson {
            first: "Ada".into(),
            middle: "King".into(),
            last: "Lovelace".into(),
            email: "ada@example.org".into(),
            website: "https://example.org/ada".into(),
            orcid: "0000-0002-1825-009x".into(),
            bio: "Analyst of the *Analytical Engine*.".into(),
        }
    }

    #[tokio::test]
    async fn person_gets_name_slug_with_suffix_on_collision() {
        let storage = test_storage().await;
        let first = add_person(&storage, ada()).await.unwrap();
        let second = add_person(&storage, ada()).await.unwrap();

        assert_eq!(first.slug, "ada-king-lovelace");
        assert_eq!(second.slug, "ada-king-lovelace-2");
        assert_eq!(first.orcid, "0000-0002-1825-009X");
        assert_eq!(
            storage.get_person(&first.id).await.unwrap().as_ref(),
            Some(&first)
        );
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let storage = test_storage().await;
        let cases = [
            NewPerson {
                last: " ".into(),
                ..ada()
            },
            NewPerson {
                email: "ada.example.org".into(),
                ..ada()
            },
            NewPerson {
                website: "ftp://example.org".into(),
                ..ada()
            },
            NewPerson {
                orcid: "0000-0002-1825".into(),
                ..ada()
            },
        ];
        for case in cases {
            let err = add_person(&storage, case).await.unwrap_err();
            assert!(matches!(err, ProfsiteError::Validation { .. }), "{err}");
        }
        assert!(storage.list_people().await.unwrap().is_empty());
    }

    #[test]
    fn orcid_shape() {
        assert!(is_orcid("0000-0002-1825-0097"));
        assert!(is_orcid("0000-0002-1694-233X"));
        assert!(!is_orcid("0000-0002-1694-X233"));
        assert!(!is_orcid("00000002-1825-0097"));
    }
}
