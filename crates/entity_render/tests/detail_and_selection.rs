//! LOD transitions, selection and picking

use std::rc::Rc;

use entity_render::core::RendererConfig;
use entity_render::entity::{DetailMask, EntityId, EntityRecord, EntityRenderer, FamilyPayload, RenderServices};
use entity_render::error::RenderError;
use entity_render::foundation::math::{Anchor, Vec2};
use entity_render::host::{HeadlessHost, HostError};
use entity_render::renderers::RelationshipFamily;
use entity_render::selection::Highlight;

fn setup() -> (Rc<HeadlessHost>, EntityRenderer<RelationshipFamily>) {
    let host = Rc::new(HeadlessHost::new());
    host.set_camera_position(Anchor::new(0.025, 0.025, 1_000.0).world());
    let services = RenderServices::new(host.clone(), 64);
    let renderer = EntityRenderer::new(RelationshipFamily::new(), services, &RendererConfig::new()).unwrap();
    (host, renderer)
}

fn link(id: &str, lat: f64) -> EntityRecord {
    EntityRecord::relationship(id, Anchor::surface(0.0, lat), Anchor::surface(0.05, lat + 0.05)).with_payload(
        FamilyPayload::Relationship {
            label: Some(id.to_uppercase()),
            arc_height: 100.0,
            show_arrow: true,
            flow_speed: 0.5,
        },
    )
}

const DECORATIONS: [DetailMask; 3] = [DetailMask::ARROW, DetailMask::FLOW, DetailMask::LABEL];

#[tokio::test]
async fn test_lod_levels_apply_the_detail_mapping() {
    let (host, mut renderer) = setup();
    renderer.add_entity(link("r", 0.0)).await.unwrap();
    let handle = renderer.handle("r").unwrap();
    let primary = handle.part(DetailMask::PRIMARY).unwrap();
    let decorations: Vec<_> = DECORATIONS.iter().map(|role| handle.part(*role).unwrap()).collect();

    assert_eq!(renderer.lod_level("r"), Some(0));
    assert!(host.is_visible(primary));
    assert!(decorations.iter().all(|part| host.is_visible(*part)));

    // between the second and third cutoff
    host.set_camera_position(Anchor::new(0.025, 0.025, 500_000.0).world());
    renderer.on_camera_changed(1_000.0);
    assert_eq!(renderer.on_pre_render(1_100.0).unwrap(), 1);
    assert_eq!(renderer.lod_level("r"), Some(2));
    assert!(host.is_visible(primary));
    assert!(decorations.iter().all(|part| !host.is_visible(*part)));
    // same level again changes nothing
    renderer.on_camera_changed(1_200.0);
    assert_eq!(renderer.on_pre_render(1_300.0).unwrap(), 0);

    host.set_camera_position(Anchor::new(0.025, 0.025, 3_000_000.0).world());
    renderer.on_camera_changed(2_000.0);
    assert_eq!(renderer.on_pre_render(2_100.0).unwrap(), 1);
    assert!(!host.is_visible(primary));
    assert_eq!(renderer.visible_entity_count(), 0);
    // hidden parts still exist on the host
    assert_eq!(host.primitive_count(), 4);
}

#[tokio::test]
async fn test_sweep_catches_missed_camera_notifications() {
    let (host, mut renderer) = setup();
    renderer.add_entity(link("r", 0.0)).await.unwrap();
    assert_eq!(renderer.on_pre_render(0.0).unwrap(), 0);

    host.set_camera_position(Anchor::new(0.025, 0.025, 100_000.0).world());
    assert_eq!(renderer.on_pre_render(100.0).unwrap(), 0);
    assert_eq!(renderer.on_pre_render(200.0).unwrap(), 1);
    assert_eq!(renderer.lod_level("r"), Some(1));
    let label = renderer.handle("r").unwrap().part(DetailMask::LABEL).unwrap();
    assert!(!host.is_visible(label));
}

#[tokio::test]
async fn test_only_one_entity_is_selected() {
    let (host, mut renderer) = setup();
    renderer.add_entity(link("a", 0.0)).await.unwrap();
    renderer.add_entity(link("b", 0.01)).await.unwrap();
    let arc = |renderer: &EntityRenderer<RelationshipFamily>, id: &str| {
        let part = renderer.handle(id).unwrap().part(DetailMask::PRIMARY).unwrap();
        host.primitive(part).unwrap().material
    };

    let ctx = renderer.services().context();
    let normal = ctx.material(&renderer.get_entity("a").unwrap().style, "glow");
    let selected = ctx.highlighted(&normal, Highlight::Selected);

    assert!(renderer.select(Some("a")).unwrap());
    assert_eq!(arc(&renderer, "a"), selected);
    assert!(renderer.select(Some("b")).unwrap());
    assert_eq!(arc(&renderer, "a"), normal);
    assert_eq!(arc(&renderer, "b"), selected);
    assert_eq!(renderer.selected(), Some(&EntityId::from("b")));

    // unknown ids leave the selection alone
    assert!(!renderer.select(Some("ghost")).unwrap());
    assert_eq!(renderer.selected(), Some(&EntityId::from("b")));

    assert!(renderer.select(None).unwrap());
    assert_eq!(arc(&renderer, "b"), normal);
}

#[tokio::test]
async fn test_removing_the_selection_clears_it() {
    let (_host, mut renderer) = setup();
    renderer.add_entity(link("a", 0.0)).await.unwrap();
    renderer.select(Some("a")).unwrap();
    renderer.hover(Some("a")).unwrap();
    renderer.remove_entity("a").unwrap();
    assert!(renderer.selected().is_none());
    assert!(renderer.hovered().is_none());
}

#[tokio::test]
async fn test_pick_resolves_any_owned_primitive() {
    let (host, mut renderer) = setup();
    renderer.add_entity(link("a", 0.0)).await.unwrap();
    renderer.add_entity(link("b", 0.01)).await.unwrap();

    let arrow = renderer.handle("b").unwrap().part(DetailMask::ARROW).unwrap();
    host.set_pick_result(Some(arrow));
    assert_eq!(renderer.select_at(Vec2::zeros()).unwrap(), Some(EntityId::from("b")));
    assert_eq!(renderer.selected(), Some(&EntityId::from("b")));

    let arc = renderer.handle("a").unwrap().part(DetailMask::PRIMARY).unwrap();
    host.set_pick_result(Some(arc));
    assert_eq!(renderer.hover_at(Vec2::zeros()).unwrap(), Some(EntityId::from("a")));
    assert_eq!(renderer.hovered(), Some(&EntityId::from("a")));

    host.set_pick_result(None);
    assert_eq!(renderer.pick(Vec2::zeros()).unwrap(), None);

    host.dispose();
    assert!(matches!(
        renderer.pick(Vec2::zeros()),
        Err(RenderError::Host(HostError::Disposed))
    ));
}
