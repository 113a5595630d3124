use core::fmt;
use std::path::PathBuf;

/// How a fragment URL is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    File(PathBuf),
    Status(u16),
}

/// One user or browser action, replayed in command-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Toggle { id: String, checked: bool },
    SetValue { id: String, value: String },
    Chip(String),
    ColorGroup(String),
    Wait(u64),
    Back,
    Forward,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toggle { id, checked: true } => write!(f, "check #{id}"),
            Self::Toggle { id, checked: false } => write!(f, "uncheck #{id}"),
            Self::SetValue { id, value } => write!(f, "set #{id}={value}"),
            Self::Chip(id) => write!(f, "chip #{id}"),
            Self::ColorGroup(family) => write!(f, "color group {family}"),
            Self::Wait(ms) => write!(f, "wait {ms}ms"),
            Self::Back => f.write_str("back"),
            Self::Forward => f.write_str("forward"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayScript {
    pub page_file: PathBuf,
    pub page_url: String,
    pub routes: Vec<(String, Route)>,
    pub default_fragment: Option<PathBuf>,
    pub steps: Vec<Step>,
}

pub fn parse<I>(args: I) -> Result<ReplayScript, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut page_file = None;
    let mut page_url = None;
    let mut script = ReplayScript::default();

    while let Some(arg) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| format!("missing value after {arg}"))
        };
        match arg.as_str() {
            "--page" => page_file = Some(PathBuf::from(value()?)),
            "--url" => page_url = Some(value()?),
            "--route" => {
                let (url, file) = split_pair(&value()?, "--route")?;
                script.routes.push((url, Route::File(PathBuf::from(file))));
            }
            "--status" => {
                let (url, code) = split_pair(&value()?, "--status")?;
                let code = code
                    .parse::<u16>()
                    .map_err(|_| format!("invalid status code `{code}` for {url}"))?;
                script.routes.push((url, Route::Status(code)));
            }
            "--default" => script.default_fragment = Some(PathBuf::from(value()?)),
            "--check" => script.steps.push(Step::Toggle {
                id: value()?,
                checked: true,
            }),
            "--uncheck" => script.steps.push(Step::Toggle {
                id: value()?,
                checked: false,
            }),
            "--set" => {
                let (id, text) = split_pair(&value()?, "--set")?;
                script.steps.push(Step::SetValue { id, value: text });
            }
            "--chip" => script.steps.push(Step::Chip(value()?)),
            "--color-group" => script.steps.push(Step::ColorGroup(value()?)),
            "--wait" => {
                let raw = value()?;
                let ms = raw
                    .parse::<u64>()
                    .map_err(|_| format!("invalid wait `{raw}` (expected milliseconds)"))?;
                script.steps.push(Step::Wait(ms));
            }
            "--back" => script.steps.push(Step::Back),
            "--forward" => script.steps.push(Step::Forward),
            other => return Err(format!("unknown argument `{other}`")),
        }
    }

    script.page_file = page_file.ok_or_else(|| "--page is required".to_owned())?;
    script.page_url = page_url.ok_or_else(|| "--url is required".to_owned())?;
    Ok(script)
}

fn split_pair(raw: &str, flag: &str) -> Result<(String, String), String> {
    // URLs contain `=` in their query; the value part never does.
    raw.rsplit_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("{flag} expects KEY=VALUE, got `{raw}`"))
}
