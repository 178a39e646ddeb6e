use super::config::ShardInstance;
use async_trait::async_trait;

/// Builds the client registered for one derived shard name.
///
/// The returned value is opaque to the shard manager; typically it is a
/// cheaply cloneable handle such as an `Arc` around a connection pool.
#[async_trait]
pub trait ClientFactory<C>: Send + Sync {
    /// Creates the client for `name` (for example `orders_0002`) using the
    /// settings of the physical instance that serves the shard.
    async fn create_client(&self, name: &str, instance: &ShardInstance) -> anyhow::Result<C>;
}

/// Adapts a synchronous closure into a [`ClientFactory`].
pub struct FnClientFactory<F> {
    create: F,
}

impl<F> FnClientFactory<F> {
    pub fn new(create: F) -> Self {
        Self { create }
    }
}

#[async_trait]
impl<C, F> ClientFactory<C> for FnClientFactory<F>
where
    C: Send + 'static,
    F: Fn(&str, &ShardInstance) -> anyhow::Result<C> + Send + Sync,
{
    async fn create_client(&self, name: &str, instance: &ShardInstance) -> anyhow::Result<C> {
        (self.create)(name, instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_factory_passes_name_and_settings() {
        let factory = FnClientFactory::new(|name: &str, instance: &ShardInstance| -> anyhow::Result<String> {
            Ok(format!("{}@{}:{}", name, instance.host, instance.port))
        });
        let instance = ShardInstance::new(0, 3).host("db1").port(3306);

        let client = tokio_test::block_on(factory.create_client("tests_0001", &instance)).unwrap();
        assert_eq!(client, "tests_0001@db1:3306");
    }

    #[test]
    fn test_fn_factory_propagates_errors() {
        let factory = FnClientFactory::new(|name: &str, _: &ShardInstance| -> anyhow::Result<u8> {
            anyhow::bail!("cannot reach backend for {}", name)
        });

        let err = tokio_test::block_on(factory.create_client("tests_0000", &ShardInstance::new(0, 0)))
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot reach backend for tests_0000");
    }
}
