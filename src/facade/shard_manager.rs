use crate::config::{ShardConfig, ShardingSettings};
use crate::connection::{ShardInstance, ShardInstancePatch};
use crate::core::{BoxError, Result, ShardError, ShardIndex, ShardKey};
use crate::logging::ShardLogger;
use crate::sharding::{
    ClientRegistry, ShardResolver, UpdatePolicy, VirtualShardMap, fanout, shard_name,
};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Routes keys to virtual shards and hands out the client registered for
/// each `(shard, schema)` pair.
///
/// # Examples
///
/// ```ignore
/// let settings = Settings::from_json_file("shards.json")?;
/// let config = ShardConfig::with_fn(settings.sharding, |name, instance| {
///     Ok(Pool::connect(&instance.host, instance.port, name)?)
/// });
/// let manager = ShardManager::new(config, Arc::new(LogFacade::new())).await?;
///
/// let shard = manager.get_shard("user:42");
/// let pool = manager.get_client(shard, "orders")?;
/// ```
pub struct ShardManager<C> {
    schemas: Vec<String>,
    resolver: ShardResolver,
    shard_map: RwLock<VirtualShardMap>,
    registry: ClientRegistry<C>,
    update_policy: UpdatePolicy,
    logger: Arc<dyn ShardLogger>,
}

impl<C> ShardManager<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Builds the shard map and one client per `(schema, shard)` pair.
    ///
    /// Any failure aborts construction; a partially built manager is never
    /// returned.
    pub async fn new(config: ShardConfig<C>, logger: Arc<dyn ShardLogger>) -> Result<Self> {
        Self::build(config, logger.clone()).await.inspect_err(|err| {
            logger.error(format_args!(
                "message=Shard manager initialization failed, error={}",
                err
            ));
        })
    }

    async fn build(config: ShardConfig<C>, logger: Arc<dyn ShardLogger>) -> Result<Self> {
        let ShardConfig {
            sharding,
            hasher,
            factory,
            update_policy,
        } = config;
        sharding.validate()?;

        let ShardingSettings {
            prefix: schemas,
            shard_count,
            shard_map,
        } = sharding;
        let shard_map = VirtualShardMap::new(shard_map)?;
        let registry = ClientRegistry::initialize(
            shard_count,
            &schemas,
            &shard_map,
            factory,
            logger.as_ref(),
        )
        .await?;

        logger.log(format_args!(
            "message=Shard manager ready, shards={}, instances={}, schemas={}, policy={:?}",
            shard_count,
            shard_map.len(),
            schemas.join(","),
            update_policy
        ));

        Ok(Self {
            schemas,
            resolver: ShardResolver::new(shard_count, hasher),
            shard_map: RwLock::new(shard_map),
            registry,
            update_policy,
            logger,
        })
    }

    /// Shard index for a routing key.
    pub fn get_shard(&self, key: impl Into<ShardKey>) -> ShardIndex {
        self.resolver.resolve(&key.into())
    }

    /// Shard index for a dynamically typed key (string or integer JSON value).
    pub fn get_shard_for_value(&self, key: &JsonValue) -> Result<ShardIndex> {
        let key = ShardKey::try_from(key)?;
        Ok(self.resolver.resolve(&key))
    }

    pub fn pick_random_shard(&self) -> ShardIndex {
        self.resolver.pick_random()
    }

    pub fn num_shards(&self) -> u32 {
        self.resolver.shard_count()
    }

    pub fn schema_prefixes(&self) -> &[String] {
        &self.schemas
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    /// Every registered client name, sorted.
    pub fn client_names(&self) -> Result<Vec<String>> {
        self.registry.names()
    }

    /// Client registered for `(index, schema)`.
    pub fn get_client(&self, index: impl Into<i64>, schema: &str) -> Result<C> {
        let result = self.registry.get(index.into(), schema);
        if let Err(ShardError::ClientNotFound { name, known }) = &result {
            self.logger
                .error(format_args!("shard map: {}", known.join(",")));
            self.logger
                .error(format_args!("message=Shard not found, shard={}", name));
        }
        result
    }

    /// Connection settings of the physical instance serving `index`.
    pub fn settings_for(&self, index: impl Into<i64>) -> Result<ShardInstance> {
        let index = index.into();
        self.check_in_range(index)?;
        let map = self.shard_map.read()?;
        map.settings_for(index).cloned()
    }

    /// Rebuilds clients for `(index, schema)` according to the update policy,
    /// optionally repointing the owning physical instance first.
    ///
    /// With [`UpdatePolicy::SingleEntry`] only the requested client is
    /// rebuilt; with [`UpdatePolicy::Range`] every shard of the instance is.
    /// The patch is committed to the shard map only once the new clients
    /// exist. Returns the client now registered for `(index, schema)`.
    pub async fn update_client(
        &self,
        index: impl Into<i64>,
        schema: &str,
        patch: Option<&ShardInstancePatch>,
    ) -> Result<C> {
        let index = index.into();
        shard_name(index, schema)?;
        self.check_in_range(index)?;

        let (position, instance) = {
            let map = self.shard_map.read()?;
            let position = map
                .position_of(index)
                .ok_or(ShardError::ShardNotFound { shard: index })?;
            let mut instance = map.instances()[position].clone();
            if let Some(patch) = patch {
                instance.apply_patch(patch);
                instance.validate()?;
            }
            (position, instance)
        };

        let client = match self.update_policy {
            UpdatePolicy::SingleEntry => {
                self.registry.replace_one(index, schema, &instance).await?
            }
            UpdatePolicy::Range => self
                .registry
                .replace_range(&instance, schema)
                .await?
                .into_iter()
                .find_map(|(replaced, client)| (replaced == index).then_some(client))
                .ok_or(ShardError::ShardNotFound { shard: index })?,
        };

        if let Some(patch) = patch.filter(|patch| !patch.is_empty()) {
            self.shard_map.write()?.patch(position, patch)?;
        }

        self.logger.log(format_args!(
            "message=Client updated, shard={}, schema={}, policy={:?}, instance={}",
            index,
            schema,
            self.update_policy,
            instance.to_url()
        ));
        Ok(client)
    }

    /// Runs `op` once per shard concurrently and collects index-aligned results.
    ///
    /// Every operation runs to completion; if any failed, the lowest failing
    /// shard is reported.
    pub async fn do_for_all_shards<T, E, F, Fut>(&self, op: F) -> Result<Vec<T>>
    where
        F: FnMut(ShardIndex) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let result = fanout::for_all_shards(self.num_shards(), op).await;
        self.log_fan_out_failure(&result);
        result
    }

    /// Like [`do_for_all_shards`](Self::do_for_all_shards), passing `args`
    /// to every invocation.
    pub async fn do_for_all_shards_with<'a, A, T, E, F, Fut>(
        &self,
        args: &'a A,
        op: F,
    ) -> Result<Vec<T>>
    where
        A: ?Sized,
        F: FnMut(ShardIndex, &'a A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let result = fanout::for_all_shards_with(self.num_shards(), args, op).await;
        self.log_fan_out_failure(&result);
        result
    }

    /// Fan-out on separate tokio tasks, for `'static` operations that
    /// should run in parallel.
    pub async fn spawn_for_all_shards<T, E, F, Fut>(&self, op: F) -> Result<Vec<T>>
    where
        F: FnMut(ShardIndex) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let result = fanout::spawn_for_all_shards(self.num_shards(), op).await;
        self.log_fan_out_failure(&result);
        result
    }

    fn check_in_range(&self, index: i64) -> Result<()> {
        if index < 0 || index >= i64::from(self.num_shards()) {
            self.logger.warn(format_args!(
                "message=Shard index out of range, shard={}, shard_count={}",
                index,
                self.num_shards()
            ));
            return Err(ShardError::ShardNotFound { shard: index });
        }
        Ok(())
    }

    fn log_fan_out_failure<T>(&self, result: &Result<T>) {
        if let Err(ShardError::FanOutFailure {
            shard,
            failed_shards,
            source,
        }) = result
        {
            self.logger.error(format_args!(
                "message=Fan-out failed, shard={}, failed_shards={:?}, error={}",
                shard, failed_shards, source
            ));
        }
    }
}

impl<C> std::fmt::Debug for ShardManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("schemas", &self.schemas)
            .field("resolver", &self.resolver)
            .field("update_policy", &self.update_policy)
            .finish_non_exhaustive()
    }
}
