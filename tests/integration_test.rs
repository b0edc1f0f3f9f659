use async_trait::async_trait;
use pnpilot::config::PacingRange;
use pnpilot::infrastructure::{Connector, HttpResponse, NoPacer, RequestOptions, Transport};
use pnpilot::models::Credentials;
use pnpilot::{logger, App, Config, PartNumber, SourceConfig, TransportError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const S1_HIT_100: &str = r#"<div class="result"><span class="part-name">Hydraulic Pump</span>
    <span class="price">$45.00</span><span class="supplier">Acme Parts</span></div>"#;
const S1_HIT_200: &str = r#"<div class="result"><span class="part-name">Gasket</span>
    <span class="price">$12.50</span><span class="supplier">Acme Parts</span></div>"#;
const S2_HIT_100: &str = r#"<h2 class="product-title">Hydraulic Pump HP-1</h2>
    <span class="product-price">$30.00</span><div class="vendor">Budget Supply</div>"#;
const NO_RESULTS: &str = "<p>No products matched your search.</p>";
const CAPTCHA: &str = "<h1>Are you human?</h1><div class='g-recaptcha'></div>";
const WELCOME: &str = "<p>Welcome back</p><a href='/logout'>Logout</a>";

/// 按来源预设的站点行为
#[derive(Clone, Default)]
struct SiteScript {
    /// 登录响应，`None` 表示连接被拒绝
    login: Option<(u16, String)>,
    /// 地址前缀 -> (状态码, 页面)
    pages: Vec<(String, u16, String)>,
    /// 这些地址前缀直接返回连接错误
    errors: Vec<String>,
}

/// 记录所有来源收到的请求
type RequestLog = Arc<Mutex<Vec<String>>>;

struct ScriptedSite {
    script: SiteScript,
    log: RequestLog,
}

#[async_trait]
impl Transport for ScriptedSite {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        _options: &RequestOptions<'_>,
    ) -> Result<HttpResponse, TransportError> {
        self.log.lock().unwrap().push(format!("POST {}", url));
        assert!(form.iter().any(|(k, _)| *k == "email"));
        match &self.script.login {
            Some((status, body)) => Ok(HttpResponse {
                status: *status,
                final_url: url.to_string(),
                body: body.clone(),
            }),
            None => Err(TransportError::Connection {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }

    async fn get(&self, url: &str, _options: &RequestOptions<'_>) -> Result<HttpResponse, TransportError> {
        self.log.lock().unwrap().push(format!("GET {}", url));
        if self.script.errors.iter().any(|prefix| url.starts_with(prefix.as_str())) {
            return Err(TransportError::Connection {
                url: url.to_string(),
                message: "connection reset by peer".to_string(),
            });
        }
        for (prefix, status, body) in &self.script.pages {
            if url.starts_with(prefix.as_str()) {
                return Ok(HttpResponse {
                    status: *status,
                    final_url: url.to_string(),
                    body: body.clone(),
                });
            }
        }
        Ok(HttpResponse {
            status: 200,
            final_url: url.to_string(),
            body: NO_RESULTS.to_string(),
        })
    }
}

#[derive(Default)]
struct ScriptedConnector {
    sites: HashMap<String, SiteScript>,
    log: RequestLog,
}

impl ScriptedConnector {
    fn site(mut self, source_id: &str, script: SiteScript) -> Self {
        self.sites.insert(source_id.to_string(), script);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn searches(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.starts_with("GET "))
            .collect()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, source: &SourceConfig) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(ScriptedSite {
            script: self.sites.get(&source.source_id).cloned().unwrap_or_default(),
            log: Arc::clone(&self.log),
        }))
    }
}

fn logged_in() -> Option<(u16, String)> {
    Some((200, WELCOME.to_string()))
}

fn page(prefix: &str, body: &str) -> (String, u16, String) {
    (prefix.to_string(), 200, body.to_string())
}

fn source(id: &str, login: &str, template: &str) -> SourceConfig {
    SourceConfig {
        source_id: id.to_string(),
        login_url: login.to_string(),
        search_url_template: template.to_string(),
        credentials: Credentials {
            email: "buyer@example.com".to_string(),
            password: "secret".to_string(),
        },
    }
}

fn two_sources() -> Vec<SourceConfig> {
    vec![
        source("website_a", "https://s1.test/login", "https://s1.test/search?q={}"),
        source("website_b", "https://s2.test/login", "https://s2.test/products?query={}"),
    ]
}

/// 所有文件都放在临时目录，不等待
fn test_config(dir: &Path, sources: Vec<SourceConfig>) -> Config {
    let path = |name: &str| dir.join(name).display().to_string();
    Config {
        sources,
        proxy_file: None,
        source_delay: PacingRange::zero(),
        part_delay: PacingRange::zero(),
        input_file: path("input_parts.csv"),
        results_file: path("pnpilot_results.csv"),
        processed_file: path("processed.txt"),
        failed_file: path("failed.txt"),
        output_log_file: path("pnpilot_log.txt"),
        ..Config::default()
    }
}

fn write_input(config: &Config, content: &str) {
    std::fs::write(&config.input_file, content).unwrap();
}

fn read_lines(path: &str) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

fn read_results(path: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

fn standard_connector() -> ScriptedConnector {
    ScriptedConnector::default()
        .site(
            "website_a",
            SiteScript {
                login: logged_in(),
                pages: vec![
                    page("https://s1.test/search?q=PN-100", S1_HIT_100),
                    page("https://s1.test/search?q=PN-200", S1_HIT_200),
                ],
                ..Default::default()
            },
        )
        .site(
            "website_b",
            SiteScript {
                login: logged_in(),
                pages: vec![page("https://s2.test/products?query=PN-100", S2_HIT_100)],
                // S2 查询 PN-200 时连接失败
                errors: vec!["https://s2.test/products?query=PN-200".to_string()],
            },
        )
}

async fn start(config: Config, connector: &ScriptedConnector) -> App {
    App::initialize_with(config, connector, Arc::new(NoPacer))
        .await
        .expect("初始化失败")
}

#[tokio::test]
async fn test_cheapest_offer_wins_across_sources() {
    logger::init();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), two_sources());
    write_input(&config, "Part Number,Qty\nPN-100,2\nPN-200,5\n");
    let connector = standard_connector();

    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.resolved, 2);
    assert_eq!(stats.failed, 0);
    assert!(!stats.cancelled);

    let (headers, rows) = read_results(&config.results_file);
    assert_eq!(headers, ["Site", "Part Number", "Part Name", "Price", "Supplier", "Link"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "website_b");
    assert_eq!(rows[0][1], "PN-100");
    assert_eq!(rows[0][3], "30.00");
    assert_eq!(rows[0][4], "Budget Supply");
    assert_eq!(rows[0][5], "https://s2.test/products?query=PN-100");
    assert_eq!(rows[1][0], "website_a");
    assert_eq!(rows[1][1], "PN-200");
    assert_eq!(rows[1][3], "12.50");

    assert_eq!(read_lines(&config.processed_file), ["PN-100", "PN-200"]);
    assert!(read_lines(&config.failed_file).is_empty());

    // 每个零件在每个来源各查询一次，按配置顺序
    assert_eq!(
        connector.searches(),
        [
            "GET https://s1.test/search?q=PN-100",
            "GET https://s2.test/products?query=PN-100",
            "GET https://s1.test/search?q=PN-200",
            "GET https://s2.test/products?query=PN-200",
        ]
    );
}

#[tokio::test]
async fn test_login_failure_and_block_leave_parts_failed() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), two_sources());
    write_input(&config, "PN-100\nPN-200\n");

    let connector = ScriptedConnector::default()
        .site(
            "website_a",
            SiteScript {
                // 登录页返回 200 但没有登出链接
                login: Some((200, "<p>Invalid password</p>".to_string())),
                pages: vec![page("https://s1.test/", S1_HIT_100)],
                ..Default::default()
            },
        )
        .site(
            "website_b",
            SiteScript {
                login: logged_in(),
                pages: vec![page("https://s2.test/", CAPTCHA)],
                ..Default::default()
            },
        );

    let app = start(config.clone(), &connector).await;
    assert_eq!(app.context().sessions().failures().len(), 1);
    assert!(!app.context().sessions().is_authenticated("website_a"));

    let stats = app.run().await.unwrap();

    assert_eq!(stats.resolved, 0);
    assert_eq!(stats.failed, 2);
    assert!(!Path::new(&config.results_file).exists());
    assert_eq!(read_lines(&config.failed_file), ["PN-100", "PN-200"]);
    assert_eq!(read_lines(&config.processed_file), ["PN-100", "PN-200"]);
    assert!(connector.searches().iter().all(|r| !r.contains("s1.test")));
}

#[tokio::test]
async fn test_checkpoint_skips_processed_parts_and_rerun_is_idle() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), two_sources());
    write_input(&config, "Part Number\nPN-100\nPN-200\n");
    std::fs::write(&config.processed_file, "PN-100\n").unwrap();

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.resolved, 1);
    assert!(connector.searches().iter().all(|r| r.ends_with("PN-200")));

    let (_, rows) = read_results(&config.results_file);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], "PN-200");

    // 第二次运行：全部已处理，不发任何搜索请求
    let rerun_connector = standard_connector();
    let app = start(config.clone(), &rerun_connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.processed(), 0);
    assert!(rerun_connector.searches().is_empty());
    assert_eq!(read_results(&config.results_file).1.len(), 1);
}

#[tokio::test]
async fn test_source_without_extractor_is_never_contacted() {
    let dir = TempDir::new().unwrap();
    let mut sources = two_sources();
    sources.push(source("website_z", "https://z.test/login", "https://z.test/search?q={}"));
    let config = test_config(dir.path(), sources);
    write_input(&config, "PN-100\n");

    let connector = standard_connector();
    let app = start(config, &connector).await;

    assert_eq!(app.context().config_errors().len(), 1);
    assert_eq!(app.context().active_sources().len(), 2);

    let stats = app.run().await.unwrap();
    assert_eq!(stats.resolved, 1);
    assert!(connector.requests().iter().all(|r| !r.contains("z.test")));
}

#[tokio::test]
async fn test_retry_failed_reprocesses_only_failed_parts() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), two_sources());
    write_input(&config, "PN-100\nPN-200\nPN-300\n");
    std::fs::write(&config.processed_file, "PN-100\nPN-200\nPN-300\n").unwrap();
    std::fs::write(&config.failed_file, "PN-200\nPN-300\n").unwrap();
    config.retry_failed = true;

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.failed, 1);
    assert!(connector.searches().iter().all(|r| !r.ends_with("PN-100")));

    // 保留一份快照，失败列表只剩仍然失败的零件
    assert_eq!(read_lines(&config.failed_file), ["PN-300"]);
    let archived = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("failed.") && name != "failed.txt"
        })
        .count();
    assert_eq!(archived, 1);
}

#[tokio::test]
async fn test_retry_with_limit_keeps_untried_parts_in_failed_list() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), two_sources());
    write_input(&config, "PN-200\nPN-901\nPN-902\n");
    std::fs::write(&config.processed_file, "PN-200\nPN-901\nPN-902\n").unwrap();
    std::fs::write(&config.failed_file, "PN-200\nPN-901\nPN-902\n").unwrap();
    config.retry_failed = true;
    config.part_limit = Some(1);

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.resolved, 1);
    assert!(connector.searches().iter().all(|r| r.ends_with("PN-200")));
    // 本轮没轮到的零件仍在失败列表里
    assert_eq!(read_lines(&config.failed_file), ["PN-901", "PN-902"]);

    // 下一轮重试（不限数量）会处理剩下的零件
    config.part_limit = None;
    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.failed, 2);
    let searches = connector.searches();
    assert!(searches.iter().any(|r| r.ends_with("PN-901")));
    assert!(searches.iter().any(|r| r.ends_with("PN-902")));
    assert_eq!(read_lines(&config.failed_file), ["PN-901", "PN-902"]);
}

#[tokio::test]
async fn test_interrupted_retry_loses_no_failed_parts() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), two_sources());
    std::fs::write(&config.processed_file, "PN-200\nPN-901\n").unwrap();
    std::fs::write(&config.failed_file, "PN-200\nPN-901\n").unwrap();
    config.retry_failed = true;

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    app.cancel_flag().store(true, std::sync::atomic::Ordering::SeqCst);
    let stats = app.run().await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.processed(), 0);
    assert!(connector.searches().is_empty());
    assert_eq!(read_lines(&config.failed_file), ["PN-200", "PN-901"]);
}

#[tokio::test]
async fn test_part_number_with_line_break_does_not_break_rerun() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), two_sources());
    write_input(&config, "Part Number\n\"PN\n7\"\nPN-100\n");

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(read_lines(&config.processed_file), ["PN-100"]);

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.processed(), 0);
    assert!(connector.searches().is_empty());
    assert_eq!(read_lines(&config.processed_file), ["PN-100"]);
}

#[tokio::test]
async fn test_part_limit_and_fresh_run() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), two_sources());
    write_input(&config, "PN-100\nPN-200\nPN-300\n");
    std::fs::write(&config.processed_file, "PN-100\n").unwrap();
    std::fs::write(&config.failed_file, "PN-100\n").unwrap();
    config.fresh_run = true;
    config.part_limit = Some(2);

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    // 清空后 PN-100 不再被跳过，只处理前两个
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.processed(), 2);
    assert_eq!(read_lines(&config.processed_file), ["PN-100", "PN-200"]);
    assert!(read_lines(&config.failed_file).is_empty());
    assert!(connector.searches().iter().all(|r| !r.ends_with("PN-300")));
}

#[tokio::test]
async fn test_concurrent_parts_each_recorded_once() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), two_sources());
    write_input(&config, "PN-100\nPN-200\nPN-300\nPN-100\n");
    config.max_concurrent_parts = 3;

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;
    let stats = app.run().await.unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.resolved, 2);
    assert_eq!(stats.failed, 1);

    let mut processed: Vec<PartNumber> = read_lines(&config.processed_file)
        .iter()
        .map(|l| PartNumber::from(l.as_str()))
        .collect();
    processed.sort();
    assert_eq!(
        processed,
        [PartNumber::from("PN-100"), PartNumber::from("PN-200"), PartNumber::from("PN-300")]
    );
    assert_eq!(read_lines(&config.failed_file), ["PN-300"]);
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), two_sources());

    let connector = standard_connector();
    let app = start(config.clone(), &connector).await;

    let err = app.run().await.unwrap_err();
    assert!(err.to_string().contains("input_parts.csv"), "{}", err);
    assert!(!Path::new(&config.processed_file).exists());
}

#[tokio::test]
#[ignore] // 需要真实账号和网络：cargo test -- --ignored
async fn test_live_run_from_config() {
    logger::init();

    // 读取 pnpilot.toml 与 EMAIL_<ID> / PASSWORD_<ID> 环境变量
    let config = Config::from_env().expect("加载配置失败");

    let app = App::initialize(config).await.expect("初始化失败");
    assert!(
        !app.context().active_sources().is_empty(),
        "至少应有一个来源登录成功"
    );

    let stats = app.run().await.expect("运行失败");
    assert!(!stats.cancelled);
}
