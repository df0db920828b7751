use event_di::{
    CacheRegistry, ContextData, DiError, Depends, EventRef, LifecycleManager, MapConfigSource,
    Provider, Resolver, ResolverConfig, SenderEvent, Target,
};
use std::sync::Arc;

#[test]
fn test_default_config() {
    let config = ResolverConfig::default();
    assert_eq!(config.global_cache_key, "global");
    assert_eq!(config.user_key_prefix, "user_");
    assert_eq!(config.chat_key_prefix, "chat_");
    assert_eq!(config.max_depth, 1024);
}

#[test]
fn test_config_from_map_source() {
    let source = MapConfigSource::new()
        .set("global_cache_key", "everyone")
        .set("user_key_prefix", "u:")
        .set("max_depth", "16");
    let config = ResolverConfig::from_source(&source);

    assert_eq!(config.global_cache_key, "everyone");
    assert_eq!(config.user_key_prefix, "u:");
    assert_eq!(config.chat_key_prefix, "chat_");
    assert_eq!(config.max_depth, 16);
}

#[test]
fn test_invalid_max_depth_is_ignored() {
    for bad in ["0", "-1", "many"] {
        let config = ResolverConfig::from_source(&MapConfigSource::new().set("max_depth", bad));
        assert_eq!(config.max_depth, 1024, "accepted {bad}");
    }
}

#[test]
fn test_config_from_env_with_prefix() {
    std::env::set_var("EVENT_DI_TEST_CHAT_KEY_PREFIX", "group_");
    let config = ResolverConfig::from_env_with_prefix("EVENT_DI_TEST");
    std::env::remove_var("EVENT_DI_TEST_CHAT_KEY_PREFIX");

    assert_eq!(config.chat_key_prefix, "group_");
    assert_eq!(config.user_key_prefix, "user_");
}

#[test]
fn test_custom_prefixes_shape_cache_keys() {
    let config = ResolverConfig {
        global_cache_key: "*".to_string(),
        user_key_prefix: "u/".to_string(),
        chat_key_prefix: "c/".to_string(),
        ..ResolverConfig::default()
    };
    let registry = CacheRegistry::with_config(config);

    assert_eq!(registry.derive_cache_key(&SenderEvent::from_user(5)).as_str(), "u/5");
    assert_eq!(registry.derive_cache_key(&SenderEvent::in_chat(-100)).as_str(), "c/-100");
    assert_eq!(registry.derive_cache_key(&SenderEvent::anonymous()).as_str(), "*");
}

#[tokio::test]
async fn test_max_depth_limits_nesting() {
    // chain of five providers: p0 -> p1 -> p2 -> p3 -> p4
    let mut next: Option<Arc<Provider>> = None;
    for name in ["p4", "p3", "p2", "p1", "p0"] {
        let mut builder = Provider::value(name, |_| Ok(()));
        if let Some(inner) = &next {
            builder = builder.depends("inner", Depends::on(inner));
        }
        next = Some(builder.build());
    }
    let root = next.unwrap();
    let handler = Target::new("handler").depends("root", Depends::on(&root));
    let event: EventRef = Arc::new(SenderEvent::from_user(1));

    let shallow = CacheRegistry::with_config(ResolverConfig { max_depth: 3, ..Default::default() });
    let mut lifecycle = LifecycleManager::new();
    let err = Resolver::new(Arc::new(shallow))
        .resolve_all(&handler, &event, &ContextData::new(), &mut lifecycle)
        .await
        .unwrap_err();
    assert!(matches!(err, DiError::DepthExceeded(3)));

    let deep = CacheRegistry::with_config(ResolverConfig { max_depth: 5, ..Default::default() });
    Resolver::new(Arc::new(deep))
        .resolve_all(&handler, &event, &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
}

#[cfg(feature = "config")]
#[test]
fn test_config_json_round_trip() {
    let config = ResolverConfig::from_json_str(r#"{ "user_key_prefix": "member_", "max_depth": 8 }"#).unwrap();
    assert_eq!(config.user_key_prefix, "member_");
    assert_eq!(config.max_depth, 8);
    assert_eq!(config.global_cache_key, "global");

    let json = config.to_json_string().unwrap();
    assert_eq!(ResolverConfig::from_json_str(&json).unwrap(), config);
}
