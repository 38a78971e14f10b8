//! Web interface
//!
//! | Route     | Method | Effect                                         |
//! |-----------|--------|------------------------------------------------|
//! | `/`       | any    | Settings and firmware upload page              |
//! | `/set`    | POST   | Save `offset`/`bright`, redirect back to `/`   |
//! | `/update` | POST   | Stream a multipart firmware image, then reboot |
//!
//! One request is served per accepted connection and the connection is
//! closed afterwards. Upload bodies are never buffered whole: each socket
//! read is pushed through the multipart parser straight into the update
//! session.

use alloc::format;
use alloc::string::String;
use core::fmt::Write as _;

use embedded_io_async::{Read, Write};
use glance_http::form;
use glance_http::{
    parse_head, Method, MultipartError, MultipartParser, Part, RequestHead, ResponseHead, Status,
    MAX_HEAD_LEN,
};

use crate::device::{Device, Platform, SettingsUpdate};
use crate::settings::Settings;
use crate::update::UpdateSession;

/// Heading of the settings page
pub const PAGE_TITLE: &str = "Glance Control";

/// Largest accepted `/set` body
const MAX_FORM_LEN: usize = 512;

/// What the caller must do after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Close the connection and carry on
    Done,
    /// Close the connection and reset the chip
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Route {
    Page,
    Set,
    Update,
    NotFound,
}

fn route(head: &RequestHead) -> Route {
    match (head.path(), head.method) {
        ("/", _) => Route::Page,
        ("/set", Method::Post) => Route::Set,
        ("/update", Method::Post) => Route::Update,
        _ => Route::NotFound,
    }
}

/// Progress through the file parts of an upload. Only the first file
/// part is written; later ones are skipped.
#[derive(Debug, Default)]
struct Upload {
    started: bool,
    active: bool,
}

impl<P: Platform> Device<P> {
    /// Serve one HTTP request on `conn`.
    ///
    /// Errors are transport errors only; malformed requests get a 400 and
    /// `Ok(Outcome::Done)`.
    pub async fn serve<C: Read + Write>(&mut self, conn: &mut C) -> Result<Outcome, C::Error> {
        let mut buf = [0u8; MAX_HEAD_LEN];
        let mut filled = 0;

        let (head, head_len) = loop {
            if filled == buf.len() {
                warn!("request head exceeds {} bytes", MAX_HEAD_LEN);
                respond_text(conn, Status::BadRequest, "Request head too large").await?;
                return Ok(Outcome::Done);
            }

            let n = conn.read(&mut buf[filled..]).await?;
            if n == 0 {
                debug!("connection closed before request head");
                return Ok(Outcome::Done);
            }
            filled += n;

            match parse_head(&buf[..filled]) {
                Ok(Some(parsed)) => break parsed,
                Ok(None) => {}
                Err(e) => {
                    warn!("bad request head: {:?}", e);
                    respond_text(conn, Status::BadRequest, "Bad request").await?;
                    return Ok(Outcome::Done);
                }
            }
        };

        let route = route(&head);
        info!("{:?} {} -> {:?}", head.method, head.path(), route);

        match route {
            Route::Page => {
                let html = page(&self.settings);
                write_head(conn, ResponseHead::html(html.len())).await?;
                conn.write_all(html.as_bytes()).await?;
                conn.flush().await?;
                Ok(Outcome::Done)
            }
            Route::Set => self.handle_set(conn, &head, &buf[head_len..filled]).await,
            Route::Update => self.handle_update(conn, &head, &mut buf, head_len, filled).await,
            Route::NotFound => {
                let body = format!("Not found: {}", head.path());
                respond_text(conn, Status::NotFound, &body).await?;
                Ok(Outcome::Done)
            }
        }
    }

    async fn handle_set<C: Read + Write>(
        &mut self,
        conn: &mut C,
        head: &RequestHead,
        received: &[u8],
    ) -> Result<Outcome, C::Error> {
        let expected = head.content_length.unwrap_or(received.len());
        if expected > MAX_FORM_LEN {
            respond_text(conn, Status::PayloadTooLarge, "Form too large").await?;
            return Ok(Outcome::Done);
        }

        let mut body = heapless::Vec::<u8, MAX_FORM_LEN>::new();
        let _ = body.extend_from_slice(&received[..received.len().min(expected)]);
        while body.len() < expected {
            let mut chunk = [0u8; 128];
            let want = (expected - body.len()).min(chunk.len());
            let n = conn.read(&mut chunk[..want]).await?;
            if n == 0 {
                break;
            }
            let _ = body.extend_from_slice(&chunk[..n]);
        }

        let body = if is_urlencoded(head) {
            core::str::from_utf8(&body).unwrap_or_else(|_| {
                warn!("form body is not UTF-8");
                ""
            })
        } else {
            ""
        };

        let update = SettingsUpdate {
            timezone_offset_s: argument(head, body, "offset").map(form::to_int),
            brightness_pct: argument(head, body, "bright").map(form::to_int),
        };
        info!("settings update: {:?}", update);

        self.apply_settings(update).await;

        write_head(conn, ResponseHead::redirect("/")).await?;
        conn.flush().await?;

        self.redraw_clock();
        Ok(Outcome::Done)
    }

    async fn handle_update<C: Read + Write>(
        &mut self,
        conn: &mut C,
        head: &RequestHead,
        buf: &mut [u8; MAX_HEAD_LEN],
        start: usize,
        filled: usize,
    ) -> Result<Outcome, C::Error> {
        let mut session = UpdateSession::new();

        match head.boundary().map(MultipartParser::new) {
            None => warn!("update request is not multipart/form-data"),
            Some(Err(e)) => {
                warn!("unusable multipart boundary: {:?}", e);
                session.abort(&mut self.firmware);
            }
            Some(Ok(mut parser)) => {
                let mut upload = Upload::default();
                let mut remaining = head.content_length.map(|len| len.saturating_sub(filled - start));

                let mut fed = self
                    .feed_upload(&mut parser, &mut session, &mut upload, &buf[start..filled])
                    .await;

                while fed.is_ok() && !parser.is_finished() && remaining != Some(0) {
                    let want = remaining.map_or(buf.len(), |r| r.min(buf.len()));
                    let n = match conn.read(&mut buf[..want]).await {
                        Ok(n) => n,
                        Err(e) => {
                            if upload.active {
                                session.abort(&mut self.firmware);
                            }
                            return Err(e);
                        }
                    };
                    if n == 0 {
                        break;
                    }
                    remaining = remaining.map(|r| r - n);
                    fed = self
                        .feed_upload(&mut parser, &mut session, &mut upload, &buf[..n])
                        .await;
                }

                if let Err(e) = fed {
                    warn!("multipart body rejected: {:?}", e);
                }
                if upload.active || (fed.is_err() && !upload.started) {
                    session.abort(&mut self.firmware);
                }
            }
        }

        let text = session.response_text();
        info!("update finished: {}", text);
        respond_text(conn, Status::Ok, text).await?;
        Ok(Outcome::Restart)
    }

    async fn feed_upload(
        &mut self,
        parser: &mut MultipartParser,
        session: &mut UpdateSession,
        upload: &mut Upload,
        mut input: &[u8],
    ) -> Result<(), MultipartError> {
        while let Some(part) = parser.poll(&mut input)? {
            match part {
                Part::FileStart { field, filename } => {
                    if upload.started {
                        debug!("skipping extra file part {}", filename.as_str());
                        continue;
                    }
                    info!("receiving {} as '{}'", filename.as_str(), field.as_str());
                    upload.started = true;
                    upload.active = true;
                    session.start(&mut self.firmware).await;
                }
                Part::Data(chunk) => {
                    if upload.active {
                        session.write(&mut self.firmware, chunk).await;
                    }
                }
                Part::FileEnd => {
                    if upload.active {
                        upload.active = false;
                        session.end(&mut self.firmware).await;
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_urlencoded(head: &RequestHead) -> bool {
    head.content_type().map_or(true, |content_type| {
        content_type
            .get(..33)
            .is_some_and(|mime| mime.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
    })
}

/// Raw value of `name` from the query string, else from the form body
fn argument<'a>(head: &'a RequestHead, body: &'a str, name: &str) -> Option<&'a str> {
    head.query()
        .and_then(|query| form::field(query, name))
        .or_else(|| form::field(body, name))
}

async fn write_head<C: Write>(conn: &mut C, head: ResponseHead<'_>) -> Result<(), C::Error> {
    let mut out = heapless::String::<256>::new();
    // Status line plus at most four short headers.
    let _ = head.encode(&mut out);
    conn.write_all(out.as_bytes()).await
}

async fn respond_text<C: Write>(conn: &mut C, status: Status, body: &str) -> Result<(), C::Error> {
    write_head(conn, ResponseHead::text(status, body.len())).await?;
    conn.write_all(body.as_bytes()).await?;
    conn.flush().await
}

/// Render the settings page for the current in-memory settings
pub fn page(settings: &Settings) -> String {
    let mut html = String::with_capacity(1600);
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset='utf-8'>\
         <meta name='viewport' content='width=device-width, initial-scale=1'>\
         <title>{title}</title><style>\
         body{{font-family:sans-serif;background:#1d1f21;color:#eee;margin:0;padding:20px}}\
         .card{{background:#2b2e31;border-radius:8px;padding:16px;margin-bottom:16px}}\
         .btn{{background:#2f6fdb;color:#fff;border:none;border-radius:5px;padding:10px 20px;cursor:pointer}}\
         .go{{background:#2e9d52}}\
         input[type=number]{{padding:8px;width:110px}}\
         input[type=range]{{width:100%}}\
         </style></head><body><h2>{title}</h2>\
         <div class='card'><h3>Settings</h3>\
         <form action='/set' method='POST'>\
         <label>UTC offset (seconds): \
         <input type='number' name='offset' value='{offset}'></label><br><br>\
         <label>Brightness ({bright}%):<br>\
         <input type='range' name='bright' min='0' max='100' value='{bright}' \
         onchange='this.form.submit()'></label><br><br>\
         <input type='submit' value='Save' class='btn'></form></div>\
         <div class='card'><h3>Firmware</h3>\
         <form action='/update' method='POST' enctype='multipart/form-data'>\
         <input type='file' name='update' accept='.bin'><br><br>\
         <input type='submit' value='Upload .bin' class='btn go'></form></div>\
         </body></html>",
        title = PAGE_TITLE,
        offset = settings.timezone_offset_s,
        bright = settings.brightness_pct,
    );
    html
}
