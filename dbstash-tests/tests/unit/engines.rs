//! Unit tests for dump command construction

use dbstash::engines::{DumpCommand, DumpMode, EngineError};
use rstest::rstest;
use std::path::Path;
use test_utils::{BackupMode, Engine, EngineKind, SettingsBuilder};

fn stream(engine: Engine, builder: SettingsBuilder) -> Result<DumpCommand, EngineError> {
    engine.dump_command(&builder.build(), DumpMode::Stream, Path::new(""))
}

fn env_value<'a>(cmd: &'a DumpCommand, key: &str) -> Option<&'a str> {
    cmd.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[test]
fn test_postgres_uri_without_database_is_rejected() {
    let err = stream(Engine::Postgres, SettingsBuilder::new().uri("postgres://u:p@db:5432")).unwrap_err();
    assert!(matches!(err, EngineError::MissingDatabase { engine: "pg" }));
}

#[test]
fn test_postgres_compressed_stream_uses_custom_format() {
    let cmd = stream(
        Engine::Postgres,
        SettingsBuilder::new().uri("postgres://u:p@db/app").compress(true),
    )
    .unwrap();
    assert_eq!(cmd.program, "pg_dump");
    assert_eq!(cmd.args, vec!["--format=custom", "postgres://u:p@db/app"]);
}

#[test]
fn test_postgres_plain_stream_with_host_uses_child_env() {
    let cmd = stream(
        Engine::Postgres,
        SettingsBuilder::new()
            .host("db")
            .port("5433")
            .credentials("backup", "s3cret")
            .database("app")
            .extra_args("--no-owner"),
    )
    .unwrap();

    assert_eq!(cmd.args, vec!["--format=plain", "--no-owner", "app"]);
    assert_eq!(env_value(&cmd, "PGHOST"), Some("db"));
    assert_eq!(env_value(&cmd, "PGPORT"), Some("5433"));
    assert_eq!(env_value(&cmd, "PGUSER"), Some("backup"));
    assert_eq!(env_value(&cmd, "PGPASSWORD"), Some("s3cret"));
    assert!(!cmd.masked().contains("s3cret"));
}

#[test]
fn test_postgres_directory_mode() {
    let cmd = Engine::Postgres
        .dump_command(
            &SettingsBuilder::new().uri("postgres://db/app").build(),
            DumpMode::Directory,
            Path::new("/work/dir"),
        )
        .unwrap();
    assert_eq!(
        cmd.args,
        vec!["--format=directory", "--file=/work/dir", "postgres://db/app"]
    );
}

#[test]
fn test_pg_dumpall_stream_only() {
    let settings = SettingsBuilder::new()
        .uri("postgres://u:p@db:5432/app?sslmode=require")
        .all_databases(true)
        .build();

    let cmd = Engine::Postgres
        .dump_command(&settings, DumpMode::Stream, Path::new(""))
        .unwrap();
    assert_eq!(cmd.program, "pg_dumpall");
    assert_eq!(cmd.args, vec!["-d", "postgres://u:p@db:5432/?sslmode=require"]);

    let err = Engine::Postgres
        .dump_command(&settings, DumpMode::Directory, Path::new("/tmp/x"))
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedMode { engine: "pg_dumpall", .. }));
}

#[test]
fn test_mongo_uri_stream() {
    let cmd = stream(
        Engine::Mongo,
        SettingsBuilder::new().uri("mongodb://admin:pw@mongo:27017/orders").compress(true),
    )
    .unwrap();
    assert_eq!(
        cmd.args,
        vec![
            "--archive",
            "--gzip",
            "--uri=mongodb://admin:pw@mongo:27017/orders",
            "--db=orders"
        ]
    );
    assert!(cmd.masked().contains("admin:****@mongo"));
}

#[test]
fn test_mongo_discrete_fields() {
    let cmd = stream(
        Engine::Mongo,
        SettingsBuilder::new()
            .host("mongo")
            .port("27018")
            .database("orders")
            .credentials("root", "pw"),
    )
    .unwrap();
    assert_eq!(
        cmd.args,
        vec![
            "--archive",
            "--host=mongo",
            "--port=27018",
            "--db=orders",
            "--username=root",
            "--password=pw",
            "--authenticationDatabase=admin"
        ]
    );
}

#[test]
fn test_mysql_from_uri() {
    let cmd = stream(
        Engine::MySql { mariadb: false },
        SettingsBuilder::new().uri("mysql://root:pw@db:3306/shop"),
    )
    .unwrap();
    assert_eq!(cmd.program, "mysqldump");
    assert_eq!(cmd.args, vec!["--host=db", "--port=3306", "--user=root", "-ppw", "shop"]);
    assert_eq!(cmd.masked(), "mysqldump --host=db --port=3306 --user=root -p**** shop");
}

#[test]
fn test_mysql_uri_credentials_are_decoded() {
    let cmd = stream(
        Engine::MySql { mariadb: false },
        SettingsBuilder::new().uri("mysql://backup:p%40ss%2Fword@db:3306/shop"),
    )
    .unwrap();
    assert_eq!(
        cmd.args,
        vec!["--host=db", "--port=3306", "--user=backup", "-pp@ss/word", "shop"]
    );
    assert!(!cmd.masked().contains("p@ss"));
}

#[test]
fn test_mysql_compress_adds_nothing() {
    let cmd = stream(
        Engine::MySql { mariadb: false },
        SettingsBuilder::new().uri("mysql://root:pw@db/shop").compress(true),
    )
    .unwrap();
    assert_eq!(cmd.args, vec!["--host=db", "--user=root", "-ppw", "shop"]);
}

#[test]
fn test_mariadb_all_databases() {
    let cmd = stream(
        Engine::MySql { mariadb: true },
        SettingsBuilder::new().host("maria").no_database().all_databases(true),
    )
    .unwrap();
    assert_eq!(cmd.args, vec!["--host=maria", "--all-databases"]);
}

#[test]
fn test_redis_password_from_uri_user() {
    let cmd = stream(Engine::Redis, SettingsBuilder::new().uri("redis://secret@cache:6380")).unwrap();
    assert_eq!(
        cmd.args,
        vec!["-h", "cache", "-p", "6380", "-a", "secret", "--no-auth-warning", "--rdb", "-"]
    );
    assert!(!cmd.masked().contains("secret"));
}

#[test]
fn test_redis_decodes_uri_password() {
    let cmd = stream(Engine::Redis, SettingsBuilder::new().uri("redis://:s%23cret@cache")).unwrap();
    assert_eq!(
        cmd.args,
        vec!["-h", "cache", "-a", "s#cret", "--no-auth-warning", "--rdb", "-"]
    );
}

#[test]
fn test_redis_discrete_user_is_not_a_password() {
    let cmd = stream(
        Engine::Redis,
        SettingsBuilder::new().host("cache").user("default").no_database(),
    )
    .unwrap();
    assert_eq!(cmd.args, vec!["-h", "cache", "--rdb", "-"]);

    let cmd = stream(
        Engine::Redis,
        SettingsBuilder::new().host("cache").credentials("default", "pw").no_database(),
    )
    .unwrap();
    assert_eq!(
        cmd.args,
        vec!["-h", "cache", "-a", "pw", "--no-auth-warning", "--rdb", "-"]
    );
}

#[test]
fn test_redis_rejects_directory_mode() {
    let err = Engine::Redis
        .dump_command(
            &SettingsBuilder::new().uri("redis://cache").build(),
            DumpMode::Directory,
            Path::new("/tmp/x"),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedMode { engine: "redis", .. }));
}

#[test]
fn test_dump_binary_override() {
    let cmd = stream(
        Engine::Postgres,
        SettingsBuilder::new()
            .uri("postgres://db/app")
            .dump_binary(Path::new("/opt/pg16/bin/pg_dump")),
    )
    .unwrap();
    assert_eq!(cmd.program, "/opt/pg16/bin/pg_dump");
    assert_eq!(cmd.display_name(), "pg_dump");
}

#[test]
fn test_missing_connection() {
    let err = stream(Engine::Mongo, SettingsBuilder::new().no_host()).unwrap_err();
    assert!(matches!(err, EngineError::MissingConnection { engine: "mongo" }));
}

#[rstest]
#[case(EngineKind::Pg, false, ".sql")]
#[case(EngineKind::Pg, true, ".dump")]
#[case(EngineKind::Mongo, false, ".archive")]
#[case(EngineKind::Mongo, true, ".archive.gz")]
#[case(EngineKind::Mysql, true, ".sql")]
#[case(EngineKind::Mariadb, false, ".sql")]
#[case(EngineKind::Redis, false, ".rdb")]
fn test_default_extensions(#[case] kind: EngineKind, #[case] compressed: bool, #[case] expected: &str) {
    assert_eq!(Engine::from_kind(kind).default_extension(compressed), expected);
}

#[rstest]
#[case(Engine::Postgres, "--format=directory", 1)]
#[case(Engine::Postgres, "-f /tmp/out", 1)]
#[case(Engine::Postgres, "-f/tmp/out.sql", 1)]
#[case(Engine::Postgres, "-Fd --no-owner", 1)]
#[case(Engine::Postgres, "--no-owner --clean", 0)]
#[case(Engine::Mongo, "--out=/dump", 1)]
#[case(Engine::Mongo, "-o/tmp/out", 1)]
#[case(Engine::Mongo, "--oplog", 0)]
#[case(Engine::MySql { mariadb: false }, "--tab=/dump", 1)]
#[case(Engine::MySql { mariadb: false }, "--tables orders", 0)]
#[case(Engine::Redis, "--tab=/dump", 0)]
fn test_stream_conflicts(#[case] engine: Engine, #[case] extra: &str, #[case] expected: usize) {
    assert_eq!(engine.find_conflicts(DumpMode::Stream, extra).len(), expected);
}

#[test]
fn test_no_conflicts_outside_stream_mode() {
    let settings = SettingsBuilder::new().mode(BackupMode::Directory).build();
    assert_eq!(settings.mode, BackupMode::Directory);
    assert!(Engine::Postgres
        .find_conflicts(DumpMode::Directory, "--format=directory")
        .is_empty());
}
