use anyhow::{Result, bail};

/// A value on the XML-RPC wire. Struct members keep document order so
/// downstream consumers never depend on map iteration order.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlValue {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    Array(Vec<XmlValue>),
    Struct(Vec<(String, XmlValue)>),
    Nil,
}

impl XmlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[XmlValue]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[(String, XmlValue)]> {
        match self {
            Self::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// First struct member with the given name.
    pub fn get(&self, name: &str) -> Option<&XmlValue> {
        self.as_struct()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Render a complete `<methodCall>` document.
pub fn encode_request(method: &str, params: &[XmlValue]) -> String {
    let mut request = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    request.push_str(&format!("<methodName>{}</methodName>", escape(method)));
    request.push_str("<params>");
    for param in params {
        request.push_str("<param>");
        encode_value(param, &mut request);
        request.push_str("</param>");
    }
    request.push_str("</params></methodCall>");
    request
}

fn encode_value(value: &XmlValue, out: &mut String) {
    out.push_str("<value>");
    match value {
        XmlValue::String(text) => {
            out.push_str("<string>");
            out.push_str(&escape(text));
            out.push_str("</string>");
        }
        XmlValue::Int(number) => out.push_str(&format!("<int>{number}</int>")),
        XmlValue::Bool(flag) => {
            out.push_str(&format!("<boolean>{}</boolean>", if *flag { 1 } else { 0 }))
        }
        XmlValue::Double(number) => out.push_str(&format!("<double>{number}</double>")),
        XmlValue::Array(values) => {
            out.push_str("<array><data>");
            for item in values {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        XmlValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        XmlValue::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Decode a `<methodResponse>` document into its single return value.
/// A `<fault>` response becomes an error carrying the fault code and text.
pub fn decode_response(xml: &str) -> Result<XmlValue> {
    let mut cursor = Cursor { rest: xml };
    cursor.skip_prolog();
    cursor.expect("<methodResponse>")?;
    if cursor.eat("<fault>") {
        let fault = cursor.parse_value()?;
        let code = fault
            .get("faultCode")
            .map(|value| match value {
                XmlValue::Int(number) => number.to_string(),
                XmlValue::String(text) => text.clone(),
                _ => "?".to_string(),
            })
            .unwrap_or_else(|| "?".to_string());
        let message = fault
            .get("faultString")
            .and_then(XmlValue::as_str)
            .unwrap_or("unknown fault");
        bail!("XML-RPC fault [{code}]: {message}");
    }
    cursor.expect("<params>")?;
    cursor.expect("<param>")?;
    cursor.parse_value()
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn skip_prolog(&mut self) {
        let trimmed = self.rest.trim_start();
        if trimmed.starts_with("<?xml")
            && let Some(end) = trimmed.find("?>")
        {
            self.rest = &trimmed[end + 2..];
        } else {
            self.rest = trimmed;
        }
    }

    fn peek_is(&self, token: &str) -> bool {
        self.rest.trim_start().starts_with(token)
    }

    fn eat(&mut self, token: &str) -> bool {
        let trimmed = self.rest.trim_start();
        if let Some(rest) = trimmed.strip_prefix(token) {
            self.rest = rest;
            return true;
        }
        false
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            return Ok(());
        }
        let context = self.rest.trim_start().chars().take(40).collect::<String>();
        bail!("malformed XML-RPC payload: expected {token} near {context:?}")
    }

    /// Raw text up to `token`, consuming the token as well.
    fn take_until(&mut self, token: &str) -> Result<&'a str> {
        let Some(position) = self.rest.find(token) else {
            bail!("malformed XML-RPC payload: unterminated {token}");
        };
        let text = &self.rest[..position];
        self.rest = &self.rest[position + token.len()..];
        Ok(text)
    }

    fn parse_value(&mut self) -> Result<XmlValue> {
        self.expect("<value>")?;
        // An untyped <value> body is a string; that branch consumes the
        // closing tag itself.
        if self.eat("</value>") {
            return Ok(XmlValue::String(String::new()));
        }
        if !self.peek_is("<") {
            return Ok(XmlValue::String(unescape(self.take_until("</value>")?)));
        }
        let value = if self.eat("<string>") {
            let text = unescape(self.take_until("</string>")?);
            XmlValue::String(text)
        } else if self.eat("<int>") {
            XmlValue::Int(parse_number(self.take_until("</int>")?)?)
        } else if self.eat("<i4>") {
            XmlValue::Int(parse_number(self.take_until("</i4>")?)?)
        } else if self.eat("<boolean>") {
            XmlValue::Bool(self.take_until("</boolean>")?.trim() == "1")
        } else if self.eat("<double>") {
            let raw = self.take_until("</double>")?;
            match raw.trim().parse::<f64>() {
                Ok(number) => XmlValue::Double(number),
                Err(_) => bail!("malformed XML-RPC payload: bad double {raw:?}"),
            }
        } else if self.eat("<nil/>") {
            XmlValue::Nil
        } else if self.eat("<array>") {
            self.expect("<data>")?;
            let mut values = Vec::new();
            while self.peek_is("<value>") {
                values.push(self.parse_value()?);
            }
            self.expect("</data>")?;
            self.expect("</array>")?;
            XmlValue::Array(values)
        } else if self.eat("<struct>") {
            let mut members = Vec::new();
            while self.eat("<member>") {
                self.expect("<name>")?;
                let name = unescape(self.take_until("</name>")?);
                let value = self.parse_value()?;
                self.expect("</member>")?;
                members.push((name, value));
            }
            self.expect("</struct>")?;
            XmlValue::Struct(members)
        } else {
            let context = self.rest.trim_start().chars().take(40).collect::<String>();
            bail!("malformed XML-RPC payload: unknown value type near {context:?}")
        };
        self.expect("</value>")?;
        Ok(value)
    }
}

fn parse_number(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(number) => Ok(number),
        Err(_) => bail!("malformed XML-RPC payload: bad integer {raw:?}"),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
