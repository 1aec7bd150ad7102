//! Search index maintenance with two-level dispatch: first on the action,
//! then on the entity type for `create`.

use crate::models::{IndexAction, IndexEntityType, IndexMessage};
use crate::scope::MuseumScope;
use async_trait::async_trait;
use queue_worker::{QueueError, ScopedHandler};
use tracing::{info, warn};

pub struct IndexHandler;

#[async_trait]
impl<S: MuseumScope> ScopedHandler<IndexMessage, S> for IndexHandler {
    async fn handle(&self, scope: &S, message: &IndexMessage) -> Result<(), QueueError> {
        let search = &scope.services().search;

        match message.action {
            IndexAction::Create => match message.entity_type {
                IndexEntityType::Museum => search.index_museum(message.id).await?,
                IndexEntityType::Artifact => search.index_artifact(message.id).await?,
                IndexEntityType::Event => search.index_event(message.id).await?,
                IndexEntityType::TourOnline => search.index_tour_online(message.id).await?,
                IndexEntityType::Unknown => {
                    warn!(id = %message.id, "Unknown entity type for index create, skipping");
                    return Ok(());
                }
            },
            // Removal is keyed by id alone
            IndexAction::Delete => search.delete_from_index(message.id).await?,
            IndexAction::Unknown => {
                warn!(
                    id = %message.id,
                    entity_type = %message.entity_type,
                    "Unknown index action, skipping"
                );
                return Ok(());
            }
        }

        info!(
            id = %message.id,
            entity_type = %message.entity_type,
            action = %message.action,
            "Search index updated"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "IndexHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockSearchIndexService;
    use crate::testing::TestScope;
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn message(entity_type: IndexEntityType, action: IndexAction) -> IndexMessage {
        IndexMessage {
            id: Uuid::now_v7(),
            entity_type,
            action,
        }
    }

    /// A search double that rejects every call not explicitly expected.
    fn strict_search() -> MockSearchIndexService {
        let mut search = MockSearchIndexService::new();
        search.expect_index_museum().never();
        search.expect_index_artifact().never();
        search.expect_index_event().never();
        search.expect_index_tour_online().never();
        search.expect_delete_from_index().never();
        search
    }

    #[tokio::test]
    async fn test_create_dispatches_on_type() {
        let cases = [
            IndexEntityType::Museum,
            IndexEntityType::Artifact,
            IndexEntityType::Event,
            IndexEntityType::TourOnline,
        ];

        for entity_type in cases {
            let msg = message(entity_type, IndexAction::Create);
            let mut search = MockSearchIndexService::new();
            match entity_type {
                IndexEntityType::Museum => {
                    search.expect_index_museum().with(eq(msg.id)).times(1).returning(|_| Ok(()));
                }
                IndexEntityType::Artifact => {
                    search.expect_index_artifact().with(eq(msg.id)).times(1).returning(|_| Ok(()));
                }
                IndexEntityType::Event => {
                    search.expect_index_event().with(eq(msg.id)).times(1).returning(|_| Ok(()));
                }
                IndexEntityType::TourOnline => {
                    search
                        .expect_index_tour_online()
                        .with(eq(msg.id))
                        .times(1)
                        .returning(|_| Ok(()));
                }
                IndexEntityType::Unknown => unreachable!(),
            }
            search.expect_delete_from_index().never();

            let scope = TestScope::builder().search(search).build();
            IndexHandler.handle(&scope, &msg).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_with_unknown_type_is_consumed_without_indexing() {
        let scope = TestScope::builder().search(strict_search()).build();
        let result = IndexHandler
            .handle(&scope, &message(IndexEntityType::Unknown, IndexAction::Create))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delete_ignores_type() {
        for entity_type in [IndexEntityType::Artifact, IndexEntityType::Unknown] {
            let msg = message(entity_type, IndexAction::Delete);
            let mut search = MockSearchIndexService::new();
            search.expect_index_museum().never();
            search.expect_index_artifact().never();
            search.expect_index_event().never();
            search.expect_index_tour_online().never();
            search
                .expect_delete_from_index()
                .with(eq(msg.id))
                .times(1)
                .returning(|_| Ok(()));

            let scope = TestScope::builder().search(search).build();
            IndexHandler.handle(&scope, &msg).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unknown_action_is_skipped() {
        let scope = TestScope::builder().search(strict_search()).build();
        let result = IndexHandler
            .handle(&scope, &message(IndexEntityType::Museum, IndexAction::Unknown))
            .await;
        assert!(result.is_ok());
    }
}
