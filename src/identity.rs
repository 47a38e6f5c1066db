//! Maps bearer credentials to users.

use log::{info, Logger};
use uuid::Uuid;

use crate::db::SafeDb;
use crate::entities::{ProviderProfile, User};
use crate::errors::BackendError;

const BEARER_SCHEME: &str = "bearer";

/// Resolves the user behind an `Authorization` header value.
///
/// A missing header or an unknown token yields [`BackendError::UserNotFound`];
/// a header that is not a bearer credential yields
/// [`BackendError::MalformedCredential`].
pub async fn resolve(db: &SafeDb, authorization: Option<&str>) -> Result<User, BackendError> {
    let header = authorization.ok_or(BackendError::UserNotFound)?;
    let token = bearer_token(header)?;

    let token = match Uuid::parse_str(token) {
        Ok(token) => token,
        Err(_) => return Err(BackendError::UserNotFound),
    };

    db.retrieve_user_by_session(&token)
        .await?
        .ok_or(BackendError::UserNotFound)
}

/// Signs in the user behind a verified provider profile and issues a
/// session token for them. The profile is created on first sign-in and
/// refreshed on later ones.
pub async fn sign_in(
    logger: &Logger,
    db: &SafeDb,
    profile: ProviderProfile,
) -> Result<(User, Uuid), BackendError> {
    let user = db.upsert_user_by_provider(profile).await?;
    let token = db.create_session(user.id).await?;

    info!(logger, "Signed in"; "user_id" => user.id, "provider" => &user.provider);

    Ok((user, token))
}

fn bearer_token(header: &str) -> Result<&str, BackendError> {
    let mut pieces = header.trim().splitn(2, ' ');

    match (pieces.next(), pieces.next().map(str::trim)) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(BackendError::MalformedCredential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::testing::Fixture;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("bearer  abc ").unwrap(), "abc");
        assert!(matches!(
            bearer_token("Basic abc"),
            Err(BackendError::MalformedCredential)
        ));
        assert!(matches!(
            bearer_token("Bearer"),
            Err(BackendError::MalformedCredential)
        ));
    }

    #[tokio::test]
    async fn sessions_resolve_to_their_user() {
        let fixture = Fixture::new();
        let user = fixture.db.add_user("Mina");
        let token = fixture
            .db
            .create_session(user.id)
            .await
            .expect("create session");

        let header = format!("Bearer {}", token);
        let resolved = resolve(&fixture.db, Some(&header))
            .await
            .expect("resolve session");
        assert_eq!(resolved, user);
    }

    fn google_profile(name: &str) -> ProviderProfile {
        ProviderProfile {
            provider: String::from("google"),
            provider_id: String::from("108"),
            name: Some(name.to_owned()),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            image: None,
        }
    }

    #[tokio::test]
    async fn signing_in_issues_a_resolvable_session() {
        let fixture = Fixture::new();

        let (user, token) = sign_in(&fixture.logger, &fixture.db, google_profile("Mina"))
            .await
            .expect("sign in");
        assert_eq!(user.name.as_deref(), Some("Mina"));
        assert_eq!(user.bananas, 0);

        let header = format!("Bearer {}", token);
        let resolved = resolve(&fixture.db, Some(&header))
            .await
            .expect("resolve session");
        assert_eq!(resolved, user);
    }

    #[tokio::test]
    async fn signing_in_again_refreshes_the_same_user() {
        let fixture = Fixture::new();

        let (first, first_token) = sign_in(&fixture.logger, &fixture.db, google_profile("Mina"))
            .await
            .expect("first sign in");
        fixture
            .db
            .add_bananas(first.id, 5)
            .await
            .expect("add bananas");

        let (second, second_token) =
            sign_in(&fixture.logger, &fixture.db, google_profile("Mina Park"))
                .await
                .expect("second sign in");

        assert_eq!(second.id, first.id);
        assert_eq!(second.name.as_deref(), Some("Mina Park"));
        assert_eq!(second.bananas, 5);
        assert_ne!(second_token, first_token);

        let mut other = google_profile("Mina");
        other.provider = String::from("kakao");
        let (third, _) = sign_in(&fixture.logger, &fixture.db, other)
            .await
            .expect("sign in with another provider");
        assert_ne!(third.id, first.id);
    }

    #[tokio::test]
    async fn unresolvable_credentials_are_not_found() {
        let fixture = Fixture::new();

        let unknown = format!("Bearer {}", Uuid::new_v4());
        for header in &[None, Some("Bearer not-a-uuid"), Some(unknown.as_str())] {
            let result = resolve(&fixture.db, *header).await;
            assert!(matches!(result, Err(BackendError::UserNotFound)));
        }

        let result = resolve(&fixture.db, Some("Token abc")).await;
        assert!(matches!(result, Err(BackendError::MalformedCredential)));
    }
}
