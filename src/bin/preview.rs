use flow_ar::{
    flow,
    scenes::{ModelViewer, SceneKind, SpinningShapes, SurfaceModel, SurfaceShapes},
};

fn usage() -> String {
    let names: Vec<_> = SceneKind::ALL.iter().map(|kind| kind.name()).collect();
    format!("usage: flow-ar-preview <{}>", names.join("|"))
}

fn main() -> anyhow::Result<()> {
    let Some(arg) = std::env::args().nth(1) else {
        eprintln!("{}", usage());
        std::process::exit(2);
    };
    let kind: SceneKind = match arg.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{}\n{}", e, usage());
            std::process::exit(2);
        }
    };
    match kind {
        SceneKind::Shapes => flow::run(SpinningShapes::new()),
        SceneKind::ModelViewer => flow::run(ModelViewer::new()),
        SceneKind::SurfaceShapes => flow::run(SurfaceShapes::new()),
        SceneKind::SurfaceModel => flow::run(SurfaceModel::new()),
    }
}
