use async_trait::async_trait;

use inv_shared::Result;

/// Location ordering input for reservation allocation. The catalog/location
/// CRUD modules that own this data live outside the engine; this port is
/// the narrow seam the engine consumes them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationPriority {
    pub location_id: i64,
    pub priority: i32,
}

/// Declares whether a seller owns a set of variants, and in what priority
/// order their active locations should be walked during allocation.
///
/// An in-process adapter backed by the host application's own catalog
/// tables is the expected production implementation; this crate only
/// depends on the trait so it stays swappable (and mockable in tests)
/// without pulling in the catalog module's types.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VariantDirectory: Send + Sync {
    /// Errors with `Error::Forbidden` if any variant is not owned by
    /// `seller_id`, or `Error::NotFound` if a variant id does not exist.
    async fn validate_ownership(&self, seller_id: i64, variant_ids: &[i64]) -> Result<()>;

    /// Active locations for the seller, ordered by descending priority.
    async fn active_locations_by_priority(&self, seller_id: i64) -> Result<Vec<LocationPriority>>;
}

/// Adapter that authorizes everything and exposes a single, fixed-priority
/// location. Useful for tests and for hosts that haven't wired a catalog
/// yet; production deployments should supply a real adapter.
pub struct SingleLocationDirectory {
    pub location_id: i64,
}

#[async_trait]
impl VariantDirectory for SingleLocationDirectory {
    async fn validate_ownership(&self, _seller_id: i64, _variant_ids: &[i64]) -> Result<()> {
        Ok(())
    }

    async fn active_locations_by_priority(&self, _seller_id: i64) -> Result<Vec<LocationPriority>> {
        Ok(vec![LocationPriority { location_id: self.location_id, priority: 0 }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_directory_rejects_ownership_per_expectation() {
        let mut mock = MockVariantDirectory::new();
        mock.expect_validate_ownership()
            .withf(|seller_id, variant_ids| *seller_id == 42 && variant_ids == [1, 2])
            .returning(|_, _| Err(inv_shared::Error::Forbidden));

        let err = mock.validate_ownership(42, &[1, 2]).await.unwrap_err();
        assert!(matches!(err, inv_shared::Error::Forbidden));
    }

    #[tokio::test]
    async fn mock_directory_returns_configured_locations() {
        let mut mock = MockVariantDirectory::new();
        mock.expect_active_locations_by_priority()
            .returning(|_| Ok(vec![LocationPriority { location_id: 1, priority: 10 }, LocationPriority { location_id: 2, priority: 5 }]));

        let locations = mock.active_locations_by_priority(7).await.unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].priority, 10);
    }

    #[tokio::test]
    async fn single_location_directory_authorizes_everything() {
        let directory = SingleLocationDirectory { location_id: 9 };
        directory.validate_ownership(1, &[1, 2, 3]).await.unwrap();
        let locations = directory.active_locations_by_priority(1).await.unwrap();
        assert_eq!(locations, vec![LocationPriority { location_id: 9, priority: 0 }]);
    }
}
