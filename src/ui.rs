/// The clock-in page, titled with the organisation name when one is set.
pub fn render_index(organization: &str) -> String {
    let title = if organization.trim().is_empty() {
        "Time Clock".to_string()
    } else {
        escape_html(organization.trim())
    };
    INDEX_HTML.replace("{{ORGANIZATION}}", &title)
}

pub fn escape_html(raw: &str) -> String {
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

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{ORGANIZATION}}</title>
  <style>
    :root {
      --bg: #eef3f1;
      --ink: #1f2d2a;
      --in: #2e8b57;
      --out: #c0553a;
      --card: #ffffff;
      --muted: #6b7a76;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(160deg, var(--bg), #dfe9e5);
      color: var(--ink);
      font-family: "Segoe UI", "Helvetica Neue", sans-serif;
      display: grid;
      place-items: center;
      padding: 24px 16px;
    }

    main {
      width: min(440px, 100%);
      background: var(--card);
      border-radius: 20px;
      box-shadow: 0 18px 40px rgba(31, 45, 42, 0.14);
      padding: 28px;
      display: grid;
      gap: 18px;
    }

    h1 {
      margin: 0;
      font-size: 1.6rem;
    }

    #clock {
      font-size: 2.4rem;
      font-variant-numeric: tabular-nums;
      text-align: center;
    }

    label {
      display: grid;
      gap: 6px;
      font-size: 0.9rem;
      color: var(--muted);
    }

    input {
      font: inherit;
      padding: 10px 12px;
      border-radius: 10px;
      border: 1px solid #c8d5d1;
    }

    .buttons {
      display: grid;
      grid-template-columns: 1fr 1fr;
      gap: 12px;
    }

    button {
      font: inherit;
      font-weight: 600;
      border: none;
      border-radius: 12px;
      padding: 14px;
      color: white;
      cursor: pointer;
    }

    button.in {
      background: var(--in);
    }

    button.out {
      background: var(--out);
    }

    button:disabled {
      opacity: 0.6;
      cursor: wait;
    }

    #status {
      min-height: 1.4em;
      text-align: center;
    }

    #status.ok {
      color: var(--in);
    }

    #status.error {
      color: var(--out);
    }
  </style>
</head>
<body>
  <main>
    <h1>{{ORGANIZATION}}</h1>
    <div id="clock">--:--:--</div>
    <label>
      Employee code or name
      <input id="employee" list="employees" autocomplete="off" />
      <datalist id="employees"></datalist>
    </label>
    <label>
      Note
      <input id="note" />
    </label>
    <div class="buttons">
      <button class="in" id="clock-in">Clock in</button>
      <button class="out" id="clock-out">Clock out</button>
    </div>
    <div id="status"></div>
  </main>

  <script>
    const statusEl = document.getElementById('status');
    const buttons = document.querySelectorAll('button');

    const setStatus = (text, kind) => {
      statusEl.textContent = text;
      statusEl.className = kind || '';
    };

    const tick = () => {
      document.getElementById('clock').textContent = new Date().toLocaleTimeString('en-GB');
    };

    const position = () =>
      new Promise((resolve) => {
        if (!navigator.geolocation) {
          resolve({});
          return;
        }
        navigator.geolocation.getCurrentPosition(
          (pos) => resolve({ lat: pos.coords.latitude, lon: pos.coords.longitude }),
          () => resolve({}),
          { timeout: 8000 }
        );
      });

    const loadEmployees = async () => {
      const res = await fetch('/api/getemployee', { method: 'POST' });
      if (!res.ok) {
        return;
      }
      const list = document.getElementById('employees');
      list.innerHTML = '';
      for (const [name, code] of await res.json()) {
        const option = document.createElement('option');
        option.value = code;
        option.label = name;
        list.appendChild(option);
      }
    };

    const send = async (path) => {
      const employee = document.getElementById('employee').value.trim();
      if (!employee) {
        setStatus('Please specify an employee', 'error');
        return;
      }
      buttons.forEach((button) => (button.disabled = true));
      setStatus('Sending...', '');
      try {
        const body = {
          employee,
          userinfo: document.getElementById('note').value,
          client_time: new Date().toISOString(),
          ...(await position())
        };
        const res = await fetch(path, {
          method: 'POST',
          headers: { 'content-type': 'application/json' },
          body: JSON.stringify(body)
        });
        const data = await res.json();
        if (data.msg === 'SUCCESS') {
          setStatus(`Recorded at ${data.return_date}`, 'ok');
        } else {
          setStatus(data.msg || data.message || 'Request failed', 'error');
        }
      } catch (err) {
        setStatus(err.message, 'error');
      } finally {
        buttons.forEach((button) => (button.disabled = false));
      }
    };

    document.getElementById('clock-in').addEventListener('click', () => send('/api/clockin'));
    document.getElementById('clock-out').addEventListener('click', () => send('/api/clockout'));

    tick();
    setInterval(tick, 1000);
    loadEmployees().catch(() => {});
  </script>
</body>
</html>
"#;
