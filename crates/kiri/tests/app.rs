//! App-level behaviour on the mock engine.

use kiri::prelude::*;
use kiri_test::{MockEngine, TestBridge};
use tokio::runtime::Handle;

fn app(engine: &Arc<MockEngine>) -> App<MockEngine> {
    App::with_runtime(engine.clone(), 8080, Handle::current()).unwrap()
}

#[tokio::test]
async fn test_hello_world() {
    let engine = MockEngine::new();
    let app = app(&engine);
    app.get("/", |_req: Request| async { Ok(Response::ok("ok")) });
    app.start().unwrap();
    assert!(app.is_running());
    assert_eq!(engine.ports(), vec![8080]);

    let bridge = TestBridge::new(engine.clone());
    bridge
        .get("/")
        .send()
        .await
        .unwrap()
        .assert_status(200)
        .assert_text("ok");

    app.stop();
    assert!(!app.is_running());
    assert!(!engine.is_serving());
}

#[tokio::test]
async fn test_groups_and_logging_middleware() {
    let engine = MockEngine::new();
    let app = app(&engine);
    app.use_middleware(Arc::new(LoggingMiddleware::new()));
    app.group("/api", vec![], |api| {
        api.get("/users", |_req: Request| async { Ok(Response::ok("[]")) });
        api.group("/admin", vec![], |admin| {
            admin.get("stats", |_req: Request| async {
                Err(HttpError::new(403, "forbidden").into())
            });
        });
    });
    app.start().unwrap();

    let bridge = TestBridge::new(engine.clone());
    let users = bridge.get("/api/users").send().await.unwrap();
    assert_eq!(users.json::<Vec<u32>>().unwrap(), Vec::<u32>::new());

    bridge
        .get("/api/admin/stats")
        .send()
        .await
        .unwrap()
        .assert_status(403)
        .assert_text("forbidden");
}

#[tokio::test]
async fn test_failed_start_surfaces_engine_message() {
    let engine = MockEngine::new();
    let app = app(&engine);
    app.get("/", |_req: Request| async { Ok(Response::ok("ok")) });

    engine.fail_start(Some("bind: address already in use"));
    let err = app.start().unwrap_err();
    assert!(matches!(err, AppError::Ffi(_)));
    assert_eq!(err.to_string(), "bind: address already in use");
    assert_eq!(app.router().phase(), Phase::Building);

    engine.allow_start();
    app.start().unwrap();
    assert_eq!(app.router().phase(), Phase::Started);
}

#[test]
fn test_from_config_uses_port_and_frame_limit() {
    let engine = MockEngine::new();
    let config = ConfigLoader::new()
        .with_string(
            "[server]\nport = 9100\n[runtime]\nworker_threads = 1\n[frame]\nmax_frame_len = 64\n[logging]\nenabled = false\n",
            "toml",
        )
        .unwrap()
        .load()
        .unwrap();

    let app = App::from_config(engine.clone(), &config).unwrap();
    assert_eq!(app.port(), 9100);
    app.get("/", |req: Request| async move {
        Ok(Response::ok(format!("{} bytes", req.body().len())))
    });
    app.start().unwrap();
    assert_eq!(engine.ports(), vec![9100]);

    let client = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    client.block_on(async {
        let bridge = TestBridge::new(engine.clone());
        bridge
            .get("/")
            .body("small")
            .send()
            .await
            .unwrap()
            .assert_text("5 bytes");

        bridge
            .get("/")
            .body(vec![b'x'; 128])
            .send()
            .await
            .unwrap()
            .assert_status(500)
            .assert_text("cannot decode request");
    });

    drop(app);
    assert!(!engine.is_serving());
}

#[test]
fn test_from_config_rejects_invalid_config() {
    let engine = MockEngine::new();
    let mut config = KiriConfig::default();
    config.server.port = 0;
    assert!(matches!(
        App::from_config(engine, &config),
        Err(AppError::Config(_))
    ));
}

#[tokio::test]
#[should_panic(expected = "route is only allowed while building")]
async fn test_registration_after_start_panics() {
    let engine = MockEngine::new();
    let app = app(&engine);
    app.get("/", |_req: Request| async { Ok(Response::ok("ok")) });
    app.start().unwrap();
    app.get("/late", |_req: Request| async { Ok(Response::ok("late")) });
}
