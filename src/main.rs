// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示服务器
//!
//! 把路由核心与中间件链挂到一个基于 Tokio 的 TCP 监听循环上：
//! - 从 TOML 读取配置，log4rs 输出日志
//! - 中间件链在启动时一次性装配，之后只读共享
//! - 大文件按块流式发送
//! - 后台管理控制台（stop / status / help）

use log::{debug, error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{
    fs::File as TokioFile,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Instant,
};

use routekit::{
    application::{Application, Handler},
    cache::{CacheStore, DiskStore, MemoryStore},
    config::Config,
    exception::Exception,
    middleware::{
        ChainBuilder, CompressionMiddleware, RedirectionMiddleware, ResponseCacheMiddleware,
        Service, Shortener, StaticFileMiddleware,
    },
    param::HttpRequestMethod,
    request::Request,
    response::{Body, Response},
};

const CONFIG_FILE: &str = "config/development.toml";
const LOG_CONFIG_FILE: &str = "config/log4rs.yaml";
const READ_BUFFER_SIZE: usize = 8192;

fn main() {
    // 1. 日志：优先读取 YAML 配置，缺失时退回到控制台输出
    init_logging();

    // 2. 配置
    let config = match Config::from_toml(CONFIG_FILE) {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };

    // 3. 装配应用与中间件链
    let service = match build_service(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("无法装配应用：{}", e);
            return;
        }
    };

    // 4. 运行时：工作线程数由配置决定
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            return;
        }
    };

    runtime.block_on(serve(config, service));
}

fn init_logging() {
    if log4rs::init_file(LOG_CONFIG_FILE, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {m}{n}",
        )))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("无法初始化日志系统：{}", e);
            }
        }
        Err(e) => eprintln!("日志配置无效：{}", e),
    }
}

/// 演示用的路由与中间件
fn build_service(config: &Config) -> Result<Arc<dyn Service>, Exception> {
    let mut app = Application::new();
    app.named_route(
        "home",
        "/",
        Handler::new()
            .get(|_| "Hi there!")
            .head(|_| ()),
    )?
    .named_route(
        "hello",
        "/hello/<name>",
        Handler::new().get(|ctx| format!("你好，{}！", ctx.args.get("name").unwrap_or("陌生人"))),
    )?
    .named_route(
        "post",
        r"/blog/<year:\d{4}>/<title>.html",
        Handler::new().get(|ctx| {
            ctx.response.set_header("Cache-Control", "max-age=300");
            format!(
                "<h1>{}</h1><p>{}</p>",
                ctx.args.get("title").unwrap_or_default(),
                ctx.args.get("year").unwrap_or_default()
            )
        }),
    )?
    .route(
        "/echo",
        Handler::any(|ctx| {
            format!(
                "{} {} msg={}",
                ctx.request.method(),
                ctx.request.path(),
                ctx.request.param("msg").unwrap_or_default()
            )
        }),
    )?
    .route("/redir_test", Handler::new().get(|_| "redirect failed"))?;

    let post_url = app.url_for("post", &[("year", "2015"), ("title", "hello")])?;
    info!("已注册{}条路由，示例文章地址：{}", app.router().len(), post_url);

    let redirects = RedirectionMiddleware::new()
        .rule("/redir_test", "http://google.com/search?q=redirected", false)?
        .rule(r"/old/(?P<rest>.*)", "/{rest}", true)?;

    let mut shortener = Shortener::new("/s/");
    shortener
        .shorten("rust", "https://www.rust-lang.org", false)?
        .shorten("post", &post_url, false)?;

    let store: Arc<dyn CacheStore> = if config.cache_dir().is_empty() {
        Arc::new(MemoryStore::from_capacity(config.cache_size()))
    } else {
        let store = DiskStore::new(config.cache_dir()).map_err(|e| {
            Exception::InvalidConfig(format!("无法创建缓存目录{}：{}", config.cache_dir(), e))
        })?;
        Arc::new(store)
    };
    let mut cache = ResponseCacheMiddleware::new(store).vary_on_accept(true);
    if config.cache_ttl() > 0 {
        cache = cache.with_default_ttl(config.cache_ttl());
    }

    let statics = StaticFileMiddleware::new(config.static_root(), config.static_prefix())
        .with_streaming_threshold(config.streaming_threshold());

    let chain = ChainBuilder::new(app)
        .with(CompressionMiddleware::new())
        .with(redirects)
        .with(shortener)
        .with(statics)
        .with(cache)
        .build();
    Ok(Arc::from(chain))
}

async fn serve(config: Config, service: Arc<dyn Service>) {
    // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("服务端将在{}上监听Socket连接", socket);

    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));
    tokio::spawn(console(Arc::clone(&shutdown), Arc::clone(&active_connection)));

    let chunk_size = config.chunk_size();
    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let service = Arc::clone(&service);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, service, chunk_size).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
}

/// 后台管理控制台
async fn console(shutdown: Arc<Notify>, active_connection: Arc<AtomicU32>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                shutdown.notify_one();
                break;
            }
            "help" => {
                println!("== routekit Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("===================");
            }
            "status" => {
                println!("== routekit 状态 ==");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("===================");
            }
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    service: Arc<dyn Service>,
    chunk_size: usize,
) {
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }
    let n = match stream.try_read(&mut buffer) {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    let start_time = Instant::now();

    let request = match Request::try_from(&buffer[..n], id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}，返回400", id, e);
            let _ = stream.write_all(&Response::response_400().as_bytes()).await;
            return;
        }
    };

    // 中间件可能读写磁盘，放到阻塞线程池中执行
    let (request, response) =
        match tokio::task::spawn_blocking(move || {
            let response = service.call(&request);
            (request, response)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("[ID{}]处理请求时发生异常: {}", id, e);
                let _ = stream.write_all(&Response::response_500().as_bytes()).await;
                return;
            }
        };

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, {}ms",
        id,
        request.version(),
        request.path_qs(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
        start_time.elapsed().as_millis()
    );

    if request.method() == HttpRequestMethod::Head {
        let _ = stream.write_all(&response.head_bytes()).await;
        let _ = stream.flush().await;
        return;
    }

    match response.body() {
        Body::File { path, len } => {
            debug!("[ID{}]使用流式传输模式发送文件，大小: {} bytes", id, len);
            let mut file = match TokioFile::open(path).await {
                Ok(file) => file,
                Err(e) => {
                    error!("[ID{}]无法打开流文件: {}", id, e);
                    let _ = stream.write_all(&Response::response_500().as_bytes()).await;
                    return;
                }
            };
            if let Err(e) = stream.write_all(&response.head_bytes()).await {
                error!("[ID{}]发送响应头失败: {}", id, e);
                return;
            }
            let mut chunk = vec![0u8; chunk_size];
            let mut total_sent = 0u64;
            loop {
                match file.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = stream.write_all(&chunk[..n]).await {
                            error!("[ID{}]流式写入失败: {}", id, e);
                            return;
                        }
                        total_sent += n as u64;
                    }
                    Err(e) => {
                        error!("[ID{}]读取文件失败: {}", id, e);
                        return;
                    }
                }
            }
            debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
        }
        _ => {
            let bytes = response.as_bytes();
            debug!("[ID{}]发送全量响应，长度: {}", id, bytes.len());
            let _ = stream.write_all(&bytes).await;
        }
    }
    let _ = stream.flush().await;
}
