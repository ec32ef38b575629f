use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use sidebar_core_sdk::platform::NO_RECEIVER;
use sidebar_core_sdk::prelude::*;
use sidebar_core_sdk::{server, settings::KNOWN_MODELS};

/**
 * \brief CLI 程序入口：在单个进程内组装后台、侧边栏与页面触发器。
 */
#[derive(Parser, Debug)]
#[command(name = "sidebar", version, about = "Groq chat sidebar, headless driver")]
struct Cli {
    /** \brief 模拟的活动标签页地址；不提供则视为没有活动标签页。 */
    #[arg(long, global = true)]
    tab_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 模拟安装/升级事件，补齐默认设置。
     */
    Install {
        #[arg(long, value_enum, default_value_t = ReasonArg::Install)]
        reason: ReasonArg,
    },

    /** \brief 显示当前设置。 */
    Settings,

    /**
     * \brief 修改设置，未提供的字段保持原值。
     */
    Configure {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        use_extension_icon: Option<bool>,
    },

    /**
     * \brief 发送一条消息；不提供 prompt 时进入交互模式（/clear 清空，/quit 退出）。
     */
    Chat {
        #[arg(long)]
        prompt: Option<String>,
    },

    /** \brief 在指定页面上评估触发器状态，可选模拟一次点击。 */
    Trigger {
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = false)]
        click: bool,
    },

    /** \brief 模拟点击扩展图标。 */
    Icon,

    /** \brief 切换活动标签页中触发器的可见性（对应快捷命令）。 */
    Toggle,

    /**
     * \brief 启动本地 HTTP 桥接服务。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:5173")]
        addr: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReasonArg {
    Install,
    Update,
    BrowserUpdate,
}

impl From<ReasonArg> for InstallReason {
    fn from(r: ReasonArg) -> Self {
        match r {
            ReasonArg::Install => InstallReason::Install,
            ReasonArg::Update => InstallReason::Update,
            ReasonArg::BrowserUpdate => InstallReason::BrowserUpdate,
        }
    }
}

/**
 * \brief 无界面平台：侧边栏打开只打印提示，标签页中没有内容脚本。
 */
struct HeadlessPlatform {
    tab: Option<Tab>,
}

#[async_trait]
impl HostPlatform for HeadlessPlatform {
    async fn active_tab(&self) -> Result<Option<Tab>, SidebarError> {
        Ok(self.tab.clone())
    }

    async fn open_side_panel(&self, window_id: i64) -> Result<(), SidebarError> {
        println!("[side panel opened for window {}]", window_id);
        Ok(())
    }

    async fn send_to_tab(
        &self,
        _tab_id: i64,
        _message: ContentMessage,
    ) -> Result<MessageResponse, SidebarError> {
        Err(SidebarError::Transport(NO_RECEIVER.to_string()))
    }
}

#[derive(Default)]
struct HeadlessSurface {
    mounted: bool,
    hidden: bool,
}

impl TriggerSurface for HeadlessSurface {
    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn mount(&mut self) {
        self.mounted = true;
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = HostConfig::from_env();
    telemetry::set_enabled(config.telemetry_enabled);

    let store: Arc<dyn KeyValueStore> =
        Arc::new(SqliteStore::open(&config.db_path).context("open settings store failed")?);
    let platform: Arc<dyn HostPlatform> = Arc::new(HeadlessPlatform {
        tab: cli.tab_url.clone().map(|url| Tab {
            id: 1,
            window_id: 1,
            url,
        }),
    });
    let client = GroqClient::new(&config).context("build http client failed")?;
    let proxy = Arc::new(HostProxy::new(
        Arc::clone(&store),
        Arc::clone(&platform),
        client,
    ));

    match cli.command {
        Commands::Install { reason } => {
            let seeded = proxy
                .on_installed(reason.into())
                .context("seed defaults failed")?;
            if seeded.is_empty() {
                println!("Settings already present, nothing seeded");
            } else {
                println!("Seeded defaults for: {}", seeded.join(", "));
            }
        }
        Commands::Settings => {
            let s = Settings::load(store.as_ref()).context("load settings failed")?;
            print_settings(&s);
        }
        Commands::Configure {
            api_key,
            model,
            max_tokens,
            use_extension_icon,
        } => {
            let mut sidebar = SidebarController::new(
                Arc::clone(&proxy) as Arc<dyn RuntimeChannel>,
                Arc::clone(&store),
                Arc::clone(&platform),
            );
            sidebar.open_settings().context("load settings failed")?;
            if let Some(key) = api_key {
                sidebar.set_api_key(key);
                let status = sidebar.credential_status();
                if !status.message().is_empty() {
                    println!("API key: {}", status.message());
                }
            }
            if let Some(model) = model {
                if !KNOWN_MODELS.contains(&model.as_str()) {
                    println!("Note: {} is not one of {}", model, KNOWN_MODELS.join(", "));
                }
                sidebar.set_model(model);
            }
            if let Some(n) = max_tokens {
                sidebar.set_max_tokens(n);
            }
            if let Some(flag) = use_extension_icon {
                sidebar.set_use_extension_icon(flag);
            }
            if !sidebar.has_settings_changed() {
                println!("No changes");
                return Ok(());
            }
            let result = sidebar.save_settings().await;
            for note in sidebar.drain_notifications() {
                println!("{}", note.message);
            }
            result.context("save settings failed")?;
            print_settings(sidebar.form());
        }
        Commands::Chat { prompt } => {
            let mut sidebar = SidebarController::new(
                Arc::clone(&proxy) as Arc<dyn RuntimeChannel>,
                Arc::clone(&store),
                Arc::clone(&platform),
            );
            match prompt {
                Some(prompt) => {
                    sidebar.set_input(prompt);
                    if !sidebar.send().await {
                        bail!("prompt is empty");
                    }
                    println!("{}", sidebar.last_reply().unwrap_or_default());
                }
                None => run_repl(&mut sidebar).await?,
            }
        }
        Commands::Trigger { url, click } => {
            let trigger = PageTrigger::new(
                url.as_str(),
                HeadlessSurface::default(),
                Arc::clone(&store),
                Arc::clone(&proxy) as Arc<dyn RuntimeChannel>,
            );
            println!(
                "{} -> {:?} (element mounted={} hidden={})",
                url,
                trigger.state(),
                trigger.surface().mounted,
                trigger.surface().hidden
            );
            if click {
                match trigger.on_click().await {
                    Some(route) => println!("open request via {:?}", route),
                    None => println!("trigger hidden, click ignored"),
                }
            }
        }
        Commands::Icon => {
            let Some(tab) = platform.active_tab().await? else {
                bail!("no active tab, pass --tab-url");
            };
            if !proxy.on_action_clicked(&tab).await? {
                println!("Extension icon mode is off; use the page trigger instead");
            }
        }
        Commands::Toggle => {
            if proxy.toggle_trigger_in_active_tab().await? {
                println!("Trigger toggled");
            } else {
                println!("No trigger to toggle in the active tab");
            }
        }
        Commands::Serve { addr } => {
            server::run(&addr, proxy, &config.ui_dir).await?;
        }
    }

    Ok(())
}

fn print_settings(s: &Settings) {
    println!(
        "apiKey={} ({}) model={} maxTokens={} useExtensionIcon={}",
        telemetry::mask_secret(&s.api_key),
        CredentialStatus::classify(&s.api_key).message(),
        s.model,
        s.max_tokens,
        s.use_extension_icon
    );
}

/**
 * \brief 交互式对话：逐行读取输入，回车发送。
 */
async fn run_repl(sidebar: &mut SidebarController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_welcome(sidebar);
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim().to_string();
        match trimmed.as_str() {
            "/quit" => break,
            "/clear" => {
                println!("{} [y/N]", sidebar_core_sdk::sidebar::CLEAR_CONFIRMATION);
                let answer = lines.next_line().await?.unwrap_or_default();
                if sidebar.clear(|_| answer.trim().eq_ignore_ascii_case("y")) {
                    print_welcome(sidebar);
                }
            }
            cmd if cmd.starts_with('/') => {
                let picked = cmd[1..]
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .map(|n| sidebar.apply_quick_prompt(n - 1))
                    .unwrap_or(false);
                if !picked {
                    println!("unknown command {}", cmd);
                    continue;
                }
                println!("{}", sidebar.input());
                send_and_print(sidebar).await;
            }
            _ => {
                sidebar.set_input(line);
                send_and_print(sidebar).await;
            }
        }
    }
    Ok(())
}

async fn send_and_print(sidebar: &mut SidebarController) {
    if sidebar.char_count().0 > sidebar_core_sdk::sidebar::MAX_INPUT_CHARS {
        println!("({} characters)", sidebar.char_count_label());
    }
    if sidebar.send().await {
        println!("{}", sidebar.last_reply().unwrap_or_default());
    }
}

fn print_welcome(sidebar: &SidebarController) {
    println!("Welcome to AI Sidebar Assistant! Ask me anything.");
    for (i, p) in sidebar.quick_prompts().iter().enumerate() {
        println!("  /{} {}: {}", i + 1, p.label, p.prompt);
    }
}
