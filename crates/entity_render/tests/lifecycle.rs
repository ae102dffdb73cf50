//! Entity contract behavior against the headless host

use std::cell::RefCell;
use std::rc::Rc;

use entity_render::core::RendererConfig;
use entity_render::entity::{EntityId, EntityRenderer, EntityUpdate, FamilyPayload, RenderOptions, RenderServices};
use entity_render::error::RenderError;
use entity_render::events::{EntityEvent, EventKind};
use entity_render::foundation::math::Anchor;
use entity_render::host::HeadlessHost;
use entity_render::prelude::EntityRecord;
use entity_render::renderers::{ModelFamily, PointFamily, RelationshipFamily};

fn host_near(lon: f64, lat: f64) -> Rc<HeadlessHost> {
    let host = Rc::new(HeadlessHost::new());
    host.set_camera_position(Anchor::new(lon, lat, 1_000.0).world());
    host
}

fn points(host: &Rc<HeadlessHost>) -> EntityRenderer<PointFamily> {
    let services = RenderServices::new(host.clone(), 64);
    EntityRenderer::new(PointFamily::new(), services, &RendererConfig::new()).unwrap()
}

fn relationships(host: &Rc<HeadlessHost>) -> EntityRenderer<RelationshipFamily> {
    let services = RenderServices::new(host.clone(), 64);
    EntityRenderer::new(RelationshipFamily::new(), services, &RendererConfig::new()).unwrap()
}

fn link(id: &str) -> EntityRecord {
    EntityRecord::relationship(id, Anchor::surface(0.0, 0.0), Anchor::surface(0.05, 0.05)).with_payload(
        FamilyPayload::Relationship {
            label: Some(id.to_string()),
            arc_height: 200.0,
            show_arrow: true,
            flow_speed: 0.25,
        },
    )
}

#[tokio::test]
async fn test_second_add_updates_in_place() {
    let host = host_near(1.0, 1.0);
    let mut renderer = points(&host);

    let first = renderer
        .add_entity(EntityRecord::point("p", Anchor::surface(1.0, 1.0)))
        .await
        .unwrap();
    let second = renderer
        .add_entity(EntityRecord::point("p", Anchor::surface(1.001, 1.0)).with_label("moved"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(renderer.entity_count(), 1);
    // billboard plus the new label, nothing duplicated
    assert_eq!(host.primitive_count(), 2);
    assert_eq!(renderer.handle("p").unwrap().len(), 2);
    assert_eq!(renderer.get_entity("p").unwrap().anchors[0], Anchor::surface(1.001, 1.0));
}

#[tokio::test]
async fn test_remove_releases_every_part() {
    let host = host_near(0.0, 0.0);
    let mut renderer = relationships(&host);
    renderer.add_entity(link("a")).await.unwrap();
    renderer.add_entity(link("b")).await.unwrap();

    let owned: Vec<_> = renderer.handle("a").unwrap().primitive_ids().collect();
    assert_eq!(owned.len(), 4);
    assert!(renderer.remove_entity("a").unwrap());
    assert!(owned.iter().all(|id| !host.contains(*id)));
    assert_eq!(host.primitive_count(), 4);
    assert!(renderer.animation("a").is_none());
}

#[tokio::test]
async fn test_batch_collects_per_record_results() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    let records = vec![
        EntityRecord::point("ok-1", Anchor::surface(0.0, 0.0)),
        EntityRecord::new("no-anchor"),
        EntityRecord::point("ok-2", Anchor::surface(0.0, 0.001)),
        EntityRecord::point("bad-anchor", Anchor::new(0.0, 95.0, 0.0)),
        EntityRecord::point("ok-3", Anchor::surface(0.0, 0.002)),
    ];

    let results = renderer.add_entities(records).await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(results.iter().filter(|r| r.success).count(), 3);
    assert_eq!(renderer.entity_count(), 3);
    assert!(matches!(results[1].error, Some(RenderError::InvalidRecord { .. })));
}

#[tokio::test]
async fn test_batches_of_one_still_finish() {
    let host = host_near(0.0, 0.0);
    let services = RenderServices::new(host.clone(), 64);
    let mut config = RendererConfig::new();
    config.contract = config.contract.with_batch_size(1);
    let mut renderer = EntityRenderer::new(PointFamily::new(), services, &config).unwrap();

    let records = (0..7_u32)
        .map(|i| EntityRecord::point(format!("p{i}"), Anchor::surface(0.0, 0.001 * f64::from(i))))
        .collect();
    let outcome = renderer.render(records, RenderOptions::default()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.count, 7);
}

#[tokio::test]
async fn test_unknown_ids_are_noops() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    assert!(!renderer.update_entity("ghost", EntityUpdate::new().visible(false)).unwrap());
    assert!(!renderer.remove_entity("ghost").unwrap());

    let results = renderer.remove_entities(vec![EntityId::from("ghost")]).unwrap();
    assert!(!results[0].success);
    assert!(matches!(results[0].error, Some(RenderError::UnknownEntity(_))));
}

#[tokio::test]
async fn test_failed_resource_leaves_no_handle() {
    let host = host_near(2.0, 2.0);
    host.fail_resource("models/broken.glb");
    let services = RenderServices::new(host.clone(), 64);
    let mut renderer = EntityRenderer::new(ModelFamily::new(), services, &RendererConfig::new()).unwrap();

    let results = renderer
        .add_entities(vec![
            EntityRecord::model("good", Anchor::surface(2.0, 2.0), "models/truck.glb").with_label("truck"),
            EntityRecord::model("broken", Anchor::surface(2.0, 2.0), "models/broken.glb").with_label("x"),
        ])
        .await
        .unwrap();

    assert!(results[0].success);
    assert!(matches!(results[1].error, Some(RenderError::ResourceLoad { .. })));
    assert!(renderer.get_entity("broken").is_none());
    assert_eq!(host.primitive_count(), 2);
}

#[tokio::test]
async fn test_queued_remove_cancels_queued_add() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    renderer.enqueue_add(EntityRecord::point("a", Anchor::surface(0.0, 0.0)));
    renderer.enqueue_add(EntityRecord::point("b", Anchor::surface(0.0, 0.001)));
    renderer.enqueue_update("a", EntityUpdate::new().visible(false));
    renderer.enqueue_remove("a");
    assert_eq!(renderer.pending_count(), 1);

    let results = renderer.process_pending(0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(renderer.get_entity("a").is_none());
    assert!(renderer.get_entity("b").is_some());
    assert_eq!(host.primitive_count(), 1);
}

#[tokio::test]
async fn test_queue_preserves_submission_order() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    renderer.add_entity(EntityRecord::point("a", Anchor::surface(0.0, 0.0))).await.unwrap();

    renderer.enqueue_update("a", EntityUpdate::new().visible(false));
    renderer.enqueue_remove("a");
    assert_eq!(renderer.pending_count(), 1);
    renderer.enqueue_add(EntityRecord::point("a", Anchor::surface(0.0, 0.003)));
    renderer.process_pending(0.0).await.unwrap();

    let record = renderer.get_entity("a").unwrap();
    assert!(record.visible);
    assert_eq!(record.anchors[0], Anchor::surface(0.0, 0.003));
}

#[tokio::test]
async fn test_queue_is_throttled() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    renderer.enqueue_add(EntityRecord::point("a", Anchor::surface(0.0, 0.0)));
    renderer.process_pending(0.0).await.unwrap();
    renderer.enqueue_add(EntityRecord::point("b", Anchor::surface(0.0, 0.001)));

    assert!(renderer.process_pending(5.0).await.unwrap().is_empty());
    assert_eq!(renderer.process_pending(20.0).await.unwrap().len(), 1);
    assert_eq!(renderer.entity_count(), 2);
}

#[tokio::test]
async fn test_failing_handler_does_not_reach_the_caller() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    let added = Rc::new(RefCell::new(Vec::new()));

    renderer
        .events_mut()
        .subscribe(EventKind::EntityAdded, |_| Err("handler failed".into()));
    renderer.events_mut().subscribe(EventKind::EntityAdded, |_| panic!("handler panicked"));
    let sink = Rc::clone(&added);
    renderer.events_mut().subscribe(EventKind::EntityAdded, move |event| {
        if let EntityEvent::Added(id) = event {
            sink.borrow_mut().push(id.clone());
        }
        Ok(())
    });

    renderer.add_entity(EntityRecord::point("a", Anchor::surface(0.0, 0.0))).await.unwrap();
    assert_eq!(*added.borrow(), vec![EntityId::from("a")]);
    assert_eq!(renderer.events_mut().failure_count(), 2);
}

#[tokio::test]
async fn test_culling_follows_the_camera() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    renderer
        .add_entity(EntityRecord::point("near", Anchor::surface(0.0, 0.0)).with_max_distance(10_000.0))
        .await
        .unwrap();
    assert_eq!(renderer.visible_entity_count(), 1);

    host.set_camera_position(Anchor::new(0.0, 0.0, 20_000.0).world());
    assert_eq!(renderer.on_camera_settled(0.0).unwrap(), 1);
    assert_eq!(renderer.visible_entity_count(), 0);
    assert_eq!(host.visible_count(), 0);

    host.set_camera_position(Anchor::new(0.0, 0.0, 1_000.0).world());
    // throttled to the update interval
    assert_eq!(renderer.on_camera_settled(5.0).unwrap(), 0);
    assert_eq!(renderer.on_camera_settled(20.0).unwrap(), 1);
    assert_eq!(renderer.visible_entity_count(), 1);
}

#[tokio::test]
async fn test_destroyed_renderer_rejects_calls() {
    let host = host_near(0.0, 0.0);
    let mut renderer = relationships(&host);
    renderer.render(vec![link("a")], RenderOptions::default()).await.unwrap();
    assert!(renderer.is_animating());

    renderer.destroy().unwrap();
    assert!(renderer.is_destroyed());
    assert_eq!(host.primitive_count(), 0);
    assert!(!renderer.on_animation_frame(1_000.0).unwrap());
    assert!(matches!(
        renderer.add_entity(link("b")).await,
        Err(RenderError::Destroyed)
    ));
}

#[tokio::test]
async fn test_batch_updates_report_unknown_ids() {
    let host = host_near(0.0, 0.0);
    let mut renderer = points(&host);
    renderer.add_entity(EntityRecord::point("a", Anchor::surface(0.0, 0.0))).await.unwrap();

    let results = renderer
        .update_entities(vec![
            (EntityId::from("a"), EntityUpdate::new().visible(false)),
            (EntityId::from("ghost"), EntityUpdate::new().visible(false)),
        ])
        .unwrap();
    assert!(results[0].success);
    assert!(matches!(results[1].error, Some(RenderError::UnknownEntity(_))));
    assert!(!renderer.get_entity("a").unwrap().visible);
    assert_eq!(host.visible_count(), 0);
}
