use crate::state::DeviceState;

pub const UNAVAILABLE: &str = "unavailable";

const STATUS_LINE: &str = "HTTP/1.1 200 OK";
const CONTENT_TYPE: &str = "text/html";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Lumapanel</title>
  <style>
    body{font-family:'Segoe UI',sans-serif;text-align:center;background:{{hex}};transition:background .3s ease;margin:0;padding:0}
    .banner{font-size:22px;font-weight:bold;padding:15px;color:#fff;background:#222;text-shadow:0 0 10px #f0f,0 0 20px #0ff;animation:glow 2s infinite alternate}
    @keyframes glow{from{text-shadow:0 0 10px #f0f,0 0 20px #0ff}to{text-shadow:0 0 20px #ff0,0 0 30px #f0f}}
    .card{max-width:420px;margin:30px auto;padding:25px;background:rgba(255,255,255,.9);border-radius:12px;box-shadow:0 4px 16px rgba(0,0,0,.2)}
    h1{color:#333;margin-bottom:10px}p{font-size:18px;color:#555}label{font-weight:bold}
    .slider{width:60%}input[type=number]{width:50px}input[type=text]{padding:8px;width:80%;margin-top:10px}
    .swatch{width:60px;height:60px;margin:10px auto;background:{{hex}};border-radius:50%;border:2px solid #888}
  </style>
</head>
<body>
  <div class="banner">Lumapanel</div>
  <div class="card">
    <h1>RGB Controller</h1>
    <p>Temperature: <span id="temp">{{temperature}}</span> &nbsp; Humidity: <span id="humidity">{{humidity}}</span></p>
    <div class="swatch" id="swatch" title="{{hex}}"></div>
    <label for="red">Red</label><br>
    <input class="slider" type="range" id="red" min="0" max="255" value="{{r}}" oninput="slide('red')">
    <input type="number" id="redValue" min="0" max="255" value="{{r}}" oninput="typed('red')"><br>
    <label for="green">Green</label><br>
    <input class="slider" type="range" id="green" min="0" max="255" value="{{g}}" oninput="slide('green')">
    <input type="number" id="greenValue" min="0" max="255" value="{{g}}" oninput="typed('green')"><br>
    <label for="blue">Blue</label><br>
    <input class="slider" type="range" id="blue" min="0" max="255" value="{{b}}" oninput="slide('blue')">
    <input type="number" id="blueValue" min="0" max="255" value="{{b}}" oninput="typed('blue')"><br><br>
    <h2>Display</h2>
    <input type="text" id="msg" placeholder="Message (max {{max_chars}} chars)" maxlength="{{max_chars}}" value="{{message}}" oninput="sendMessage()">
  </div>
  <script>
    const q=(id)=>document.getElementById(id);
    function slide(c){q(c+'Value').value=q(c).value;sendColor();}
    function typed(c){let v=parseInt(q(c+'Value').value)||0;q(c).value=Math.min(255,Math.max(0,v));sendColor();}
    function sendColor(){
      const r=q('red').value,g=q('green').value,b=q('blue').value;
      fetch('/?r='+r+'&g='+g+'&b='+b);
      const hex='#'+[r,g,b].map(x=>('0'+parseInt(x).toString(16)).slice(-2)).join('');
      q('swatch').style.backgroundColor=hex;
      document.body.style.backgroundColor=hex;
    }
    function sendMessage(){fetch('/?msg='+encodeURIComponent(q('msg').value));}
  </script>
</body>
</html>
"#;

pub fn render_page(state: &DeviceState) -> String {
    let color = state.color();
    let sensor = state.sensor();
    let substitutions = [
        ("{{hex}}", color.hex()),
        ("{{r}}", color.r.to_string()),
        ("{{g}}", color.g.to_string()),
        ("{{b}}", color.b.to_string()),
        ("{{temperature}}", reading_text(sensor.temperature_c, "°C")),
        ("{{humidity}}", reading_text(sensor.humidity_pct, "%")),
        ("{{max_chars}}", state.max_message_chars().to_string()),
        ("{{message}}", escape_html(state.last_message())),
    ];

    substitutions
        .iter()
        .fold(PAGE_TEMPLATE.to_string(), |page, (token, value)| {
            page.replace(token, value)
        })
}

pub fn http_response(body: &str) -> String {
    format!("{STATUS_LINE}\r\nContent-Type: {CONTENT_TYPE}\r\n\r\n{body}")
}

pub fn reading_text(value: Option<f32>, unit: &str) -> String {
    match value {
        Some(value) => format!("{value:.1}{unit}"),
        None => UNAVAILABLE.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
