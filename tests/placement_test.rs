use std::{cell::RefCell, rc::Rc};

use cgmath::{Vector3, assert_relative_eq};
use flow_ar::{
    data_structures::{
        geometry::Geometry,
        material::Material,
        scene_graph::{Node, NodeId},
    },
    flow::FrameLoop,
    resources::ModelLoader,
    scenes::{
        SurfaceModel, SurfaceShapes,
        surface_model::{MODEL_PATH, MODEL_SCALE},
    },
    xr::{XrView, tracker::FrameUpdate},
};
use futures::{FutureExt, channel::oneshot};

use crate::common::test_utils::{FakeSession, RecordingRenderer, pose_at, turned_pose_at};

mod common;

fn fake_model() -> Node {
    Node::group("model")
        .with_child(Node::mesh("body", Geometry::tetrahedron(0.5), Material::default()))
        .with_child(Node::mesh("base", Geometry::cone(0.5, 0.2, 8), Material::default()))
}

/// A loader that resolves immediately and remembers which paths were asked for.
fn instant_loader(requests: Rc<RefCell<Vec<String>>>) -> ModelLoader {
    Rc::new(move |path: &str| {
        requests.borrow_mut().push(path.to_owned());
        async { Ok::<_, anyhow::Error>(fake_model()) }.boxed_local()
    })
}

/// A loader whose loads complete only when the test sends on the returned senders.
fn gated_loader(gates: Rc<RefCell<Vec<oneshot::Sender<()>>>>) -> ModelLoader {
    Rc::new(move |_path: &str| {
        let (tx, rx) = oneshot::channel();
        gates.borrow_mut().push(tx);
        async move {
            rx.await?;
            Ok::<_, anyhow::Error>(fake_model())
        }
        .boxed_local()
    })
}

fn models(frame_loop: &FrameLoop<SurfaceModel, FakeSession>) -> Vec<NodeId> {
    frame_loop
        .scene()
        .roots()
        .iter()
        .filter(|node| node.name == "model")
        .filter_map(|node| node.id())
        .collect()
}

#[test]
fn select_without_surface_places_nothing() {
    let session = FakeSession::new();
    let mut frame_loop: FrameLoop<SurfaceShapes, FakeSession> =
        FrameLoop::new(SurfaceShapes::with_seed(7), 640, 480);
    let mut renderer = RecordingRenderer::default();
    let roots = frame_loop.scene().len();

    frame_loop.select();
    frame_loop
        .on_frame(Some(&session.frame(vec![])), &mut renderer)
        .expect("frame renders");
    frame_loop.select();

    assert!(frame_loop.flow().placed().is_empty());
    assert_eq!(frame_loop.scene().len(), roots);
}

#[test]
fn blocks_accumulate_at_the_reticle() {
    let session = FakeSession::new();
    let mut frame_loop: FrameLoop<SurfaceShapes, FakeSession> =
        FrameLoop::new(SurfaceShapes::with_seed(7), 640, 480);
    let mut renderer = RecordingRenderer::default();

    let poses = [pose_at(0.2, -1.0, -1.0), turned_pose_at(-0.4, -1.0, -2.0, 90.0)];
    for pose in poses {
        let update = frame_loop
            .on_frame(Some(&session.frame_with_poses(&[pose])), &mut renderer)
            .expect("frame renders");
        assert_eq!(update, Some(FrameUpdate::Hit(pose)));
        frame_loop.select();
    }

    let placed = frame_loop.flow().placed().to_vec();
    assert_eq!(placed.len(), 2);
    for (id, pose) in placed.iter().zip(poses) {
        let block = frame_loop.scene().get(*id).expect("block is in the scene");
        assert_relative_eq!(block.position(), pose.position());
        assert_relative_eq!(block.transform.local.scale, Vector3::new(1.0, 1.0, 1.0));
    }
    let first = frame_loop.scene().get(placed[0]).expect("first block");
    let second = frame_loop.scene().get(placed[1]).expect("second block");
    assert_ne!(first.mesh_data(), None);
    assert_eq!(
        first.mesh_data().map(|m| &m.geometry),
        second.mesh_data().map(|m| &m.geometry)
    );
}

#[test]
fn second_select_replaces_and_releases_the_first_model() {
    let session = FakeSession::new();
    let requests = Rc::new(RefCell::new(Vec::new()));
    let mut frame_loop: FrameLoop<SurfaceModel, FakeSession> =
        FrameLoop::new(SurfaceModel::with_loader(instant_loader(requests.clone())), 640, 480);
    let mut renderer = RecordingRenderer::default();

    let first_pose = pose_at(0.0, -1.0, -1.0);
    frame_loop
        .on_frame(Some(&session.frame_with_poses(&[first_pose])), &mut renderer)
        .expect("frame renders");
    frame_loop.select();
    let first = frame_loop.flow().model().expect("first model placed");
    let first_subtree = frame_loop
        .scene()
        .get(first)
        .expect("first model in scene")
        .subtree_ids();

    let second_pose = turned_pose_at(1.0, -1.0, -2.0, 30.0);
    frame_loop
        .on_frame(Some(&session.frame_with_poses(&[second_pose])), &mut renderer)
        .expect("frame renders");
    frame_loop.select();
    let second = frame_loop.flow().model().expect("second model placed");

    assert_ne!(first, second);
    assert_eq!(models(&frame_loop), vec![second]);
    assert!(!frame_loop.scene().contains(first));

    let model = frame_loop.scene().get(second).expect("second model in scene");
    assert_relative_eq!(model.position(), second_pose.position());
    assert_relative_eq!(
        model.transform.local.scale,
        Vector3::new(MODEL_SCALE, MODEL_SCALE, MODEL_SCALE)
    );

    frame_loop
        .on_frame(Some(&session.frame(vec![])), &mut renderer)
        .expect("frame renders");
    for id in first_subtree {
        assert!(renderer.released.contains(&id), "{:?} was not released", id);
    }
    assert_eq!(*requests.borrow(), vec![MODEL_PATH.to_owned(), MODEL_PATH.to_owned()]);
}

#[test]
fn superseded_load_is_dropped() {
    let session = FakeSession::new();
    let gates = Rc::new(RefCell::new(Vec::new()));
    let mut frame_loop: FrameLoop<SurfaceModel, FakeSession> =
        FrameLoop::new(SurfaceModel::with_loader(gated_loader(gates.clone())), 640, 480);
    let mut renderer = RecordingRenderer::default();

    let first_pose = pose_at(0.0, -1.0, -1.0);
    let second_pose = pose_at(0.5, -1.0, -3.0);
    frame_loop
        .on_frame(Some(&session.frame_with_poses(&[first_pose])), &mut renderer)
        .expect("frame renders");
    frame_loop.select();
    frame_loop
        .on_frame(Some(&session.frame_with_poses(&[second_pose])), &mut renderer)
        .expect("frame renders");
    frame_loop.select();
    assert_eq!(frame_loop.pending(), 2);
    assert!(frame_loop.flow().model().is_none());

    let mut senders: Vec<_> = gates.borrow_mut().drain(..).collect();
    let second_gate = senders.pop().expect("second load started");
    let first_gate = senders.pop().expect("first load started");

    let _ = first_gate.send(());
    assert_eq!(frame_loop.poll_pending(), 1);
    assert!(frame_loop.flow().model().is_none());
    assert!(models(&frame_loop).is_empty());

    let _ = second_gate.send(());
    frame_loop
        .on_frame(Some(&session.frame(vec![])), &mut renderer)
        .expect("frame renders");
    let model = frame_loop.flow().model().expect("latest load placed");
    assert_eq!(models(&frame_loop), vec![model]);
    let node = frame_loop.scene().get(model).expect("model in scene");
    assert_relative_eq!(node.position(), second_pose.position());
}

#[test]
fn failed_load_leaves_the_slot_empty() {
    let session = FakeSession::new();
    let loader: ModelLoader =
        Rc::new(|_: &str| async { Err::<Node, _>(anyhow::anyhow!("404 Not Found")) }.boxed_local());
    let mut frame_loop: FrameLoop<SurfaceModel, FakeSession> =
        FrameLoop::new(SurfaceModel::with_loader(loader), 640, 480);
    let mut renderer = RecordingRenderer::default();

    frame_loop
        .on_frame(Some(&session.frame_with_poses(&[pose_at(0.0, 0.0, -1.0)])), &mut renderer)
        .expect("frame renders");
    frame_loop.select();

    assert!(frame_loop.flow().model().is_none());
    assert_eq!(frame_loop.pending(), 0);
}

#[test]
fn platform_view_drives_the_camera_during_a_session() {
    let session = FakeSession::new();
    let mut frame_loop: FrameLoop<SurfaceShapes, FakeSession> =
        FrameLoop::new(SurfaceShapes::with_seed(1), 640, 480);
    let mut renderer = RecordingRenderer::default();
    let view = XrView {
        view: cgmath::Matrix4::from_translation(Vector3::new(0.0, -1.6, 0.0)),
        projection: cgmath::perspective(cgmath::Deg(60.0), 1.0, 0.01, 20.0),
    };

    frame_loop
        .on_frame(Some(&session.frame(vec![]).with_view(view)), &mut renderer)
        .expect("frame renders");
    assert_eq!(frame_loop.camera().xr_view(), Some(&view));

    session.end();
    frame_loop.end_session();
    assert!(frame_loop.camera().xr_view().is_none());
    assert!(!frame_loop.tracker().is_ready());
}
