//! Strategy selection and dispatch through the renderer factory

use std::rc::Rc;

use entity_render::core::{FactoryConfig, RendererConfig};
use entity_render::entity::{
    EntityContract, EntityId, EntityRecord, EntityUpdate, Family, FamilyStats, RenderOptions, StyleOverrides,
};
use entity_render::error::RenderError;
use entity_render::factory::{Capabilities, RendererFactory, Strategy};
use entity_render::foundation::math::Anchor;
use entity_render::host::HeadlessHost;
use entity_render::renderers::ParticlePreset;

fn factory() -> (Rc<HeadlessHost>, RendererFactory) {
    let host = Rc::new(HeadlessHost::new());
    host.set_camera_position(Anchor::new(5.0, 5.0, 2_000.0).world());
    let factory = RendererFactory::new(host.clone(), RendererConfig::new()).unwrap();
    (host, factory)
}

fn crates(n: usize) -> Vec<EntityRecord> {
    (0..n)
        .map(|i| {
            EntityRecord::point(format!("crate-{i}"), Anchor::surface(5.0 + 0.001 * i as f64, 5.0))
                .with_style(StyleOverrides::default().with_geometry("box"))
        })
        .collect()
}

#[tokio::test]
async fn test_instancing_threshold() {
    let (host, mut factory) = factory();
    assert_eq!(factory.select_strategy(Family::Point, &crates(4)).unwrap(), Strategy::Direct);
    assert_eq!(factory.select_strategy(Family::Point, &crates(5)).unwrap(), Strategy::Instanced);

    let outcome = factory
        .render(Family::Point, crates(5), RenderOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.count, 5);
    // one instanced primitive for all five
    assert_eq!(host.primitive_count(), 1);
    assert_eq!(factory.stats().instanced_entities, 5);
}

#[tokio::test]
async fn test_fallback_without_instancing() {
    let (host, mut factory) = factory();
    factory.register(
        Family::Point,
        Capabilities {
            instancing: false,
            batching: true,
        },
    );
    assert_eq!(factory.select_strategy(Family::Point, &crates(5)).unwrap(), Strategy::Direct);
    assert_eq!(factory.select_strategy(Family::Point, &crates(10)).unwrap(), Strategy::Batched);

    factory.render(Family::Point, crates(10), RenderOptions::default()).await.unwrap();
    assert_eq!(host.primitive_count(), 10);
    assert_eq!(factory.stats().batched_entities, 10);
    assert_eq!(factory.stats().instanced_entities, 0);
}

#[tokio::test]
async fn test_thresholds_are_configurable() {
    let host = Rc::new(HeadlessHost::new());
    let mut config = RendererConfig::new();
    config.factory = FactoryConfig {
        instancing_min_entities: 2,
        ..FactoryConfig::new()
    };
    let factory = RendererFactory::new(host, config).unwrap();
    assert_eq!(factory.select_strategy(Family::Point, &crates(2)).unwrap(), Strategy::Instanced);
}

#[tokio::test]
async fn test_particles_never_instance_or_batch() {
    let (_host, mut factory) = factory();
    let emitters: Vec<EntityRecord> = (0..12)
        .map(|i| {
            EntityRecord::particle(format!("fx-{i}"), Anchor::surface(5.0, 5.0), ParticlePreset::Smoke)
                .with_style(StyleOverrides::default().with_geometry("sphere"))
        })
        .collect();
    assert_eq!(factory.select_strategy(Family::Particle, &emitters).unwrap(), Strategy::Direct);
    factory.render(Family::Particle, emitters, RenderOptions::default()).await.unwrap();

    let stats = factory.renderer_stats();
    assert_eq!(stats.len(), 1);
    let (family, strategy, renderer) = &stats[0];
    assert_eq!((*family, *strategy), (Family::Particle, Strategy::Direct));
    assert!(matches!(renderer.family, FamilyStats::Particle { emitters: 12, .. }));
}

#[tokio::test]
async fn test_unsupported_family_fails_the_call() {
    let (_host, mut factory) = factory();
    factory.unregister(Family::Trajectory).unwrap();
    assert!(!factory.is_registered(Family::Trajectory));

    let records = vec![EntityRecord::trajectory(
        "t",
        vec![Anchor::surface(5.0, 5.0), Anchor::surface(5.1, 5.1)],
    )];
    let result = factory.render(Family::Trajectory, records, RenderOptions::default()).await;
    assert!(matches!(result, Err(RenderError::UnsupportedFamily(_))));
    assert!(matches!(
        "satellite".parse::<Family>(),
        Err(RenderError::UnsupportedFamily(_))
    ));
}

#[tokio::test]
async fn test_renderers_are_reused_and_share_styles() {
    let (_host, mut factory) = factory();
    factory
        .render(Family::Point, crates(2), RenderOptions::default())
        .await
        .unwrap();
    factory
        .render(Family::Point, crates(3), RenderOptions::incremental())
        .await
        .unwrap();
    assert_eq!(factory.renderer_count(), 1);
    // crate-0 and crate-1 were resubmitted and updated in place
    assert_eq!(
        factory.cached(Family::Point, Strategy::Direct).unwrap().entity_count(),
        3
    );

    factory
        .render(
            Family::Relationship,
            vec![EntityRecord::relationship(
                "r",
                Anchor::surface(5.0, 5.0),
                Anchor::surface(5.01, 5.01),
            )],
            RenderOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(factory.renderer_count(), 2);
    assert!(factory.services().styles.stats().entries > 0);
}

#[tokio::test]
async fn test_frame_notifications_reach_every_renderer() {
    let (host, mut factory) = factory();
    factory
        .render(
            Family::Particle,
            vec![EntityRecord::particle("fx", Anchor::surface(5.0, 5.0), ParticlePreset::Fire)],
            RenderOptions::default(),
        )
        .await
        .unwrap();

    let mut now = 0.0;
    for _ in 0..30 {
        now += 1000.0 / 60.0;
        factory.on_pre_render(now).unwrap();
        factory.on_animation_frame(now).unwrap();
    }
    assert!(host.frame_requests() > 0);
    let stats = factory.renderer_stats();
    assert!(matches!(stats[0].2.family, FamilyStats::Particle { active, .. } if active > 0));

    factory.destroy_all().unwrap();
    assert_eq!(host.primitive_count(), 0);
}

fn total_entities(factory: &RendererFactory) -> usize {
    factory
        .renderer_stats()
        .iter()
        .map(|(_, _, stats)| stats.total_entities)
        .sum()
}

#[tokio::test]
async fn test_strategy_switch_replaces_earlier_submission() {
    let (host, mut factory) = factory();
    factory.render(Family::Point, crates(4), RenderOptions::default()).await.unwrap();
    factory.render(Family::Point, crates(5), RenderOptions::default()).await.unwrap();

    assert_eq!(total_entities(&factory), 5);
    assert_eq!(factory.cached(Family::Point, Strategy::Direct).unwrap().entity_count(), 0);
    // only the instanced group primitive is left
    assert_eq!(host.primitive_count(), 1);
}

#[tokio::test]
async fn test_incremental_resubmission_moves_ids_between_strategies() {
    let (host, mut factory) = factory();
    let mut extra = crates(1);
    extra[0].id = EntityId::from("extra");
    factory.render(Family::Point, extra, RenderOptions::default()).await.unwrap();
    factory.render(Family::Point, crates(4), RenderOptions::incremental()).await.unwrap();
    assert_eq!(total_entities(&factory), 5);

    factory.render(Family::Point, crates(5), RenderOptions::incremental()).await.unwrap();
    assert_eq!(total_entities(&factory), 6);
    let direct = factory.cached(Family::Point, Strategy::Direct).unwrap();
    assert_eq!(direct.entity_count(), 1);
    assert!(direct.get_entity("extra").is_some());
    assert!(direct.get_entity("crate-0").is_none());
    // one billboard for "extra" plus the instanced group
    assert_eq!(host.primitive_count(), 2);
}

#[tokio::test]
async fn test_batch_forms_through_the_contract() {
    let (_host, mut factory) = factory();
    for strategy in [Strategy::Direct, Strategy::Instanced] {
        let renderer: &mut dyn EntityContract = factory.renderer(Family::Point, strategy).unwrap();
        renderer.add_entities(crates(3)).await.unwrap();

        let updates = vec![
            (EntityId::from("crate-0"), EntityUpdate::new().visible(false)),
            (EntityId::from("ghost"), EntityUpdate::new().visible(false)),
        ];
        let results = renderer.update_entities(updates).unwrap();
        assert!(results[0].success);
        assert!(matches!(results[1].error, Some(RenderError::UnknownEntity(_))));
        assert_eq!(renderer.visible_entity_count(), 2);

        let results = renderer
            .remove_entities(vec![EntityId::from("crate-1"), EntityId::from("ghost")])
            .unwrap();
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(renderer.entity_count(), 2);
        renderer.clear().unwrap();
    }
}

#[tokio::test]
async fn test_factory_drains_queued_operations() {
    let (_host, mut factory) = factory();
    let renderer = factory.renderer(Family::Point, Strategy::Instanced).unwrap();
    for record in crates(3) {
        renderer.enqueue_add(record);
    }
    renderer.enqueue_remove(EntityId::from("crate-2"));
    assert_eq!(renderer.pending_count(), 2);

    let results = factory.process_pending(0.0).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success));
    let renderer = factory.cached(Family::Point, Strategy::Instanced).unwrap();
    assert_eq!(renderer.entity_count(), 2);
    assert_eq!(renderer.pending_count(), 0);
}

#[tokio::test]
async fn test_hover_is_visible_through_the_contract() {
    let (_host, mut factory) = factory();
    let renderer = factory.renderer(Family::Point, Strategy::Instanced).unwrap();
    renderer.add_entities(crates(2)).await.unwrap();
    assert!(renderer.hover(Some("crate-1")).unwrap());
    assert_eq!(renderer.hovered(), Some(&EntityId::from("crate-1")));
    renderer.remove_entity("crate-1").unwrap();
    assert!(renderer.hovered().is_none());
}
