mod active_game;
mod admin;
mod helpers;
mod mocks;
mod webhooks;

mod misc {
    use actix_web::{body::MessageBody, test, test::TestRequest, App};
    use credit_engine::{
        events::EventProducers,
        test_utils::prepare_env::{drop_database, fresh_database},
    };

    use crate::{config::ServerConfig, routes::health, server::create_server_instance};

    #[actix_web::test]
    async fn health_endpoint() {
        let app = test::init_service(App::new().service(health)).await;
        let req = TestRequest::get().uri("/health").to_request();
        let (_req, res) = test::call_service(&app, req).await.into_parts();
        let status = res.status();
        let body = res.into_body().try_into_bytes().unwrap();
        assert!(status.is_success());
        assert_eq!(body, "👍️\n");
    }

    #[actix_web::test]
    async fn server_instance_serves_requests() {
        let (url, db) = fresh_database().await;
        let port = std::net::TcpListener::bind("127.0.0.1:0").and_then(|l| l.local_addr()).unwrap().port();
        let config = ServerConfig::new("127.0.0.1", port);
        let srv = create_server_instance(config, db.clone(), EventProducers::default())
            .expect("Error creating server instance");
        let handle = srv.handle();
        let running = actix_web::rt::spawn(srv);
        let res = reqwest::get(format!("http://127.0.0.1:{port}/health")).await.expect("Error calling server");
        assert!(res.status().is_success());
        assert_eq!(res.text().await.unwrap(), "👍️\n");
        handle.stop(true).await;
        running.await.unwrap().unwrap();
        drop_database(&url, db).await;
    }
}
