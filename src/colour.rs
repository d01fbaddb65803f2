//! 日志着色：按状态码与请求方法分类。

use owo_colors::{AnsiColors, OwoColorize};

/// 是否为日志输出着色，启动时由 `--colour` 决定，随请求显式传递。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(self) -> bool {
        self.enabled
    }

    /// 客户端地址与上传提示使用的强调色。
    pub fn highlight(self, text: &str) -> String {
        self.paint(text, Some(AnsiColors::Cyan))
    }

    /// 按状态码百位分类着色，1xx..5xx 以外的状态码不着色。
    pub fn status(self, code: u16) -> String {
        self.paint(&code.to_string(), status_colour(code))
    }

    pub fn http_method(self, method: &str) -> String {
        self.paint(method, Some(http_method_colour(method)))
    }

    pub fn webdav_method(self, method: &str) -> String {
        self.paint(method, Some(webdav_method_colour(method)))
    }

    fn paint(self, text: &str, colour: Option<AnsiColors>) -> String {
        match colour {
            Some(colour) if self.enabled => text.color(colour).to_string(),
            _ => text.to_string(),
        }
    }
}

fn status_colour(code: u16) -> Option<AnsiColors> {
    match code {
        100..=199 => Some(AnsiColors::Magenta),
        200..=299 => Some(AnsiColors::Green),
        300..=399 => Some(AnsiColors::Cyan),
        400..=499 => Some(AnsiColors::Yellow),
        500..=599 => Some(AnsiColors::Red),
        _ => None,
    }
}

fn http_method_colour(method: &str) -> AnsiColors {
    match method {
        "GET" => AnsiColors::Cyan,
        "POST" => AnsiColors::Magenta,
        "HEAD" | "OPTIONS" => AnsiColors::Blue,
        _ => AnsiColors::Yellow,
    }
}

fn webdav_method_colour(method: &str) -> AnsiColors {
    match method {
        // read-only queries
        "HEAD" | "PROPFIND" => AnsiColors::Cyan,
        "MKCOL" | "MOVE" | "DELETE" | "COPY" | "PROPPATCH" | "PUT" | "GET" => {
            AnsiColors::Magenta
        }
        _ => AnsiColors::Yellow,
    }
}
