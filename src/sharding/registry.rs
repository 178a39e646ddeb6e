use super::naming::shard_name;
use super::shard_map::VirtualShardMap;
use crate::connection::{ClientFactory, ShardInstance};
use crate::core::{Result, ShardError};
use crate::logging::ShardLogger;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// How `update_client` repoints clients after a settings change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePolicy {
    /// Rebuild only the client for the requested shard and schema.
    #[default]
    SingleEntry,
    /// Rebuild the clients of every virtual shard served by the same
    /// physical instance, for the requested schema.
    Range,
}

/// Owns the clients registered under derived shard names.
///
/// The map is only written by explicit replacement. Replacement clients are
/// built before the write lock is taken, so readers never wait on a factory.
pub struct ClientRegistry<C> {
    shard_count: u32,
    clients: RwLock<HashMap<String, C>>,
    factory: Arc<dyn ClientFactory<C>>,
}

impl<C> ClientRegistry<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Creates one client per `(schema, shard)` pair.
    ///
    /// Nothing is published unless every client was created.
    pub async fn initialize(
        shard_count: u32,
        schemas: &[String],
        map: &VirtualShardMap,
        factory: Arc<dyn ClientFactory<C>>,
        logger: &dyn ShardLogger,
    ) -> Result<Self> {
        let mut plan = Vec::with_capacity(shard_count as usize * schemas.len());
        for index in 0..i64::from(shard_count) {
            let instance = map.settings_for(index)?;
            for schema in schemas {
                plan.push((shard_name(index, schema)?, instance));
            }
        }

        let created = try_join_all(
            plan.iter()
                .map(|(name, instance)| create(factory.as_ref(), name, instance)),
        )
        .await?;

        let mut clients = HashMap::with_capacity(plan.len());
        for ((name, instance), client) in plan.into_iter().zip(created) {
            logger.debug(format_args!(
                "message=Client created, shard={}, instance={}",
                name,
                instance.to_url()
            ));
            clients.insert(name, client);
        }

        Ok(Self {
            shard_count,
            clients: RwLock::new(clients),
            factory,
        })
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Returns the client registered for `(index, schema)`.
    ///
    /// There is no lazy creation: an unknown pair is an error.
    pub fn get(&self, index: i64, schema: &str) -> Result<C> {
        let name = shard_name(index, schema)?;
        let clients = self.clients.read()?;

        match clients.get(&name) {
            Some(client) => Ok(client.clone()),
            None => Err(ShardError::ClientNotFound {
                known: sorted_names(&*clients),
                name,
            }),
        }
    }

    /// Rebuilds the client for a single `(index, schema)` pair.
    pub async fn replace_one(
        &self,
        index: i64,
        schema: &str,
        instance: &ShardInstance,
    ) -> Result<C> {
        let name = shard_name(index, schema)?;
        let client = create(self.factory.as_ref(), &name, instance).await?;

        self.clients.write()?.insert(name, client.clone());
        Ok(client)
    }

    /// Rebuilds the clients of every shard `instance` serves under `schema`.
    ///
    /// Indices of the range beyond the configured shard count are skipped.
    /// Returns the new clients keyed by shard index, in ascending order.
    pub async fn replace_range(
        &self,
        instance: &ShardInstance,
        schema: &str,
    ) -> Result<Vec<(i64, C)>> {
        let first = instance.virtual_start.max(0);
        let last = instance.virtual_end.min(i64::from(self.shard_count) - 1);

        let mut names = Vec::new();
        for index in first..=last {
            names.push((index, shard_name(index, schema)?));
        }

        let created = try_join_all(
            names
                .iter()
                .map(|(_, name)| create(self.factory.as_ref(), name, instance)),
        )
        .await?;

        let mut clients = self.clients.write()?;
        let mut replaced = Vec::with_capacity(names.len());
        for ((index, name), client) in names.into_iter().zip(created) {
            clients.insert(name, client.clone());
            replaced.push((index, client));
        }
        Ok(replaced)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(sorted_names(&*self.clients.read()?))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.clients.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

async fn create<C>(
    factory: &dyn ClientFactory<C>,
    name: &str,
    instance: &ShardInstance,
) -> Result<C> {
    factory
        .create_client(name, instance)
        .await
        .map_err(|source| ShardError::ClientCreationFailed {
            name: name.to_string(),
            source: source.into(),
        })
}

fn sorted_names<C>(clients: &HashMap<String, C>) -> Vec<String> {
    let mut names = clients.keys().cloned().collect::<Vec<_>>();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FnClientFactory;
    use crate::logging::NoopLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct FakePool {
        database: String,
        host: String,
        port: u16,
        generation: usize,
    }

    fn counting_factory(counter: Arc<AtomicUsize>) -> Arc<dyn ClientFactory<FakePool>> {
        Arc::new(FnClientFactory::new(
            move |name: &str, instance: &ShardInstance| -> anyhow::Result<FakePool> {
                Ok(FakePool {
                    database: name.to_string(),
                    host: instance.host.clone(),
                    port: instance.port,
                    generation: counter.fetch_add(1, Ordering::SeqCst),
                })
            },
        ))
    }

    fn test_map() -> VirtualShardMap {
        VirtualShardMap::new(vec![
            ShardInstance::new(0, 2).host("localhost").port(3306),
            ShardInstance::new(3, 3).host("not-localhost.com").port(1337),
        ])
        .unwrap()
    }

    fn schemas(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    async fn registry(counter: Arc<AtomicUsize>) -> ClientRegistry<FakePool> {
        ClientRegistry::initialize(
            4,
            &schemas(&["tests", "audit"]),
            &test_map(),
            counting_factory(counter),
            &NoopLogger,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_creates_every_pair() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = registry(counter.clone()).await;

        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(registry.len().unwrap(), 8);
        assert_eq!(registry.names().unwrap()[0], "audit_0000");

        let client = registry.get(3, "tests").unwrap();
        assert_eq!(client.database, "tests_0003");
        assert_eq!(client.host, "not-localhost.com");
        assert_eq!(client.port, 1337);

        let client = registry.get(1, "audit").unwrap();
        assert_eq!(client.database, "audit_0001");
        assert_eq!(client.host, "localhost");
    }

    #[tokio::test]
    async fn test_get_unknown_pairs() {
        let registry = registry(Arc::new(AtomicUsize::new(0))).await;

        let err = registry.get(0, "missing").unwrap_err();
        match err {
            ShardError::ClientNotFound { name, known } => {
                assert_eq!(name, "missing_0000");
                assert_eq!(known.len(), 8);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(registry.get(4, "tests"), Err(ShardError::ClientNotFound { .. })));
        assert!(matches!(registry.get(-1, "tests"), Err(ShardError::InvalidShardIndex(_))));
    }

    #[tokio::test]
    async fn test_initialize_fails_on_uncovered_shard() {
        let map = VirtualShardMap::new(vec![ShardInstance::new(0, 2)]).unwrap();
        let result = ClientRegistry::initialize(
            4,
            &schemas(&["tests"]),
            &map,
            counting_factory(Arc::new(AtomicUsize::new(0))),
            &NoopLogger,
        )
        .await;

        assert!(matches!(result, Err(ShardError::ShardNotFound { shard: 3 })));
    }

    #[tokio::test]
    async fn test_initialize_fails_on_factory_error() {
        let factory: Arc<dyn ClientFactory<FakePool>> = Arc::new(FnClientFactory::new(
            |name: &str, _: &ShardInstance| -> anyhow::Result<FakePool> {
                anyhow::bail!("refused connection for {}", name)
            },
        ));
        let result = ClientRegistry::initialize(4, &schemas(&["tests"]), &test_map(), factory, &NoopLogger).await;

        match result {
            Err(ShardError::ClientCreationFailed { name, source }) => {
                assert!(name.starts_with("tests_"));
                assert!(source.to_string().starts_with("refused connection"));
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("initialization should fail"),
        }
    }

    #[tokio::test]
    async fn test_replace_one() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = registry(counter.clone()).await;
        let moved = ShardInstance::new(0, 2).host("replacement").port(3307);

        let client = registry.replace_one(1, "tests", &moved).await.unwrap();
        assert_eq!(client.host, "replacement");
        assert_eq!(client.generation, 8);

        assert_eq!(registry.get(1, "tests").unwrap(), client);
        assert_eq!(registry.get(0, "tests").unwrap().host, "localhost");
        assert_eq!(registry.get(1, "audit").unwrap().host, "localhost");
        assert_eq!(registry.len().unwrap(), 8);
    }

    #[tokio::test]
    async fn test_replace_range() {
        let registry = registry(Arc::new(AtomicUsize::new(0))).await;
        let moved = ShardInstance::new(0, 2).host("replacement");

        let replaced = registry.replace_range(&moved, "tests").await.unwrap();
        let indices: Vec<i64> = replaced.iter().map(|(index, _)| *index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        for index in 0..=2 {
            assert_eq!(registry.get(index, "tests").unwrap().host, "replacement");
            assert_eq!(registry.get(index, "audit").unwrap().host, "localhost");
        }
        assert_eq!(registry.get(3, "tests").unwrap().host, "not-localhost.com");
    }

    #[tokio::test]
    async fn test_replace_range_is_clipped_to_shard_count() {
        let registry = registry(Arc::new(AtomicUsize::new(0))).await;
        let wide = ShardInstance::new(3, 10).host("wide");

        let replaced = registry.replace_range(&wide, "tests").await.unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(registry.len().unwrap(), 8);
    }

    #[tokio::test]
    async fn test_replacing_twice_is_equivalent() {
        let registry = registry(Arc::new(AtomicUsize::new(0))).await;
        let instance = ShardInstance::new(3, 3).host("not-localhost.com").port(1337);

        let first = registry.replace_one(3, "tests", &instance).await.unwrap();
        let second = registry.replace_one(3, "tests", &instance).await.unwrap();

        assert_eq!((&first.database, &first.host, first.port), (&second.database, &second.host, second.port));
        assert_eq!(registry.get(3, "tests").unwrap(), second);
    }

    #[tokio::test]
    async fn test_failed_replacement_keeps_old_client() {
        let registry = registry(Arc::new(AtomicUsize::new(0))).await;
        let before = registry.get(2, "tests").unwrap();

        let failing = ClientRegistry {
            shard_count: registry.shard_count,
            clients: RwLock::new(registry.clients.read().unwrap().clone()),
            factory: Arc::new(FnClientFactory::new(
                |_: &str, _: &ShardInstance| -> anyhow::Result<FakePool> { anyhow::bail!("down") },
            )),
        };

        let result = failing.replace_one(2, "tests", &ShardInstance::new(0, 2)).await;
        assert!(matches!(result, Err(ShardError::ClientCreationFailed { .. })));
        assert_eq!(failing.get(2, "tests").unwrap(), before);
    }
}
