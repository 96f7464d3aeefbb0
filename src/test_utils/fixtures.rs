//! Fixture projects.

use std::path::{Path, PathBuf};

/// A web service on the default network: four replicas updated one at a
/// time, host port 8080 forwarded to container port 80.
pub const SHOP_PROJECT: &str = r#"
name: shop
services:
  web:
    image: nginx
    ports:
      - "8080:80/tcp"
    deploy:
      replicas: 4
      update_config:
        parallelism: 1
"#;

/// Two services on separate networks sharing a file-backed secret and a
/// volume, with autoscaling and rolling-update overrides on the API.
pub const STORE_PROJECT: &str = r#"
name: store
services:
  api:
    image: example/api:1.2
    environment:
      LOG_LEVEL: info
    ports:
      - target: 8000
        published: 80
    networks:
      - front
      - back
    secrets:
      - db_password
    volumes:
      - uploads:/srv/uploads
    depends_on:
      - db
    deploy:
      replicas: 2
      update_config:
        x-ecs:
          min-percent: 50
    x-ecs:
      autoscaling:
        min: 2
        max: 6
        cpu: 70
  db:
    image: postgres:16
    networks:
      - back
    secrets:
      - source: db_password
        target: POSTGRES_PASSWORD
    deploy:
      resources:
        limits:
          cpus: "1"
          memory: 2G
networks:
  front:
  back:
volumes:
  uploads:
secrets:
  db_password:
    file: ./db_password.txt
x-ecs:
  retention-in-days: 14
"#;

/// Value of the `db_password` secret of [`STORE_PROJECT`].
pub const STORE_SECRET: &str = "hunter2";

/// Write `content` to `compose.yaml` in `dir`.
pub fn write_project(dir: &Path, content: &str) -> std::io::Result<PathBuf> {
    let path = dir.join("compose.yaml");
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Write [`STORE_PROJECT`] and its secret file to `dir`.
pub fn write_store_project(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::write(dir.join("db_password.txt"), STORE_SECRET)?;
    write_project(dir, STORE_PROJECT)
}
