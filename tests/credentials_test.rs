mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use playlist_tuner::error::AppError;
use playlist_tuner::management::{CredentialProvider, SessionCredentials, SessionStore};
use playlist_tuner::types::UserProfile;

use common::{FakeOAuth, token};

async fn logged_in(store: &SessionStore, expires_in_secs: i64) -> String {
    let id = store.create().await;
    let mut stored = token("access-token");
    stored.expires_at = Utc::now() + Duration::seconds(expires_in_secs);
    store.set_token(&id, stored).await;
    store
        .update(&id, |s| {
            s.profile = Some(UserProfile {
                id: "listener".into(),
                display_name: "Listener".into(),
                image_url: None,
            })
        })
        .await;
    id
}

#[tokio::test]
async fn test_valid_token_is_returned_as_is() {
    let store = SessionStore::new(24);
    let id = logged_in(&store, 3600).await;
    let oauth = Arc::new(FakeOAuth::default());
    let credentials = SessionCredentials::new(store, id, oauth.clone());

    let current = credentials.get().await.unwrap();

    assert_eq!(current.access_token, "access-token");
    assert!(oauth.refreshed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_before_use() {
    let store = SessionStore::new(24);
    let id = logged_in(&store, 30).await;
    let oauth = Arc::new(FakeOAuth::default());
    let credentials = SessionCredentials::new(store.clone(), id.clone(), oauth.clone());

    let current = credentials.get().await.unwrap();

    assert_eq!(current.access_token, "fresh-token");
    assert_eq!(*oauth.refreshed.lock().unwrap(), ["refresh-token"]);

    let stored = store.token(&id).await.unwrap();
    assert_eq!(stored.access_token, "fresh-token");
    assert_eq!(stored.refresh_token, "rotated-refresh-token");
}

#[tokio::test]
async fn test_refresh_keeps_old_refresh_token_when_none_is_returned() {
    let store = SessionStore::new(24);
    let id = logged_in(&store, 3600).await;
    let oauth = Arc::new(FakeOAuth {
        omit_refresh_token: true,
        ..Default::default()
    });
    let credentials = SessionCredentials::new(store.clone(), id.clone(), oauth);

    let fresh = credentials.refresh().await.unwrap();

    assert_eq!(fresh.refresh_token, "refresh-token");
    assert_eq!(store.token(&id).await.unwrap().refresh_token, "refresh-token");
}

#[tokio::test]
async fn test_failed_refresh_clears_the_session() {
    let store = SessionStore::new(24);
    let id = logged_in(&store, 3600).await;
    let oauth = Arc::new(FakeOAuth {
        fail_refresh: true,
        ..Default::default()
    });
    let credentials = SessionCredentials::new(store.clone(), id.clone(), oauth);

    let err = credentials.refresh().await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let session = store.get(&id).await.unwrap();
    assert!(session.token.is_none());
    assert!(session.profile.is_none());
    assert!(matches!(
        credentials.get().await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_clear_forgets_credentials() {
    let store = SessionStore::new(24);
    let id = logged_in(&store, 3600).await;
    let credentials = SessionCredentials::new(store.clone(), id.clone(), Arc::new(FakeOAuth::default()));

    credentials.clear().await;

    assert!(store.token(&id).await.is_none());
    assert!(credentials.get().await.is_err());
}
