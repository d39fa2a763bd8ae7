use axum::response::{Html, IntoResponse};

pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ResNet-50 Image Classifier</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #f5f7fa;
            min-height: 100vh;
            color: #333;
            padding: 30px 0;
        }

        .container {
            background: white;
            border-radius: 16px;
            padding: 40px;
            box-shadow: 0 10px 40px rgba(0, 0, 0, 0.08);
            max-width: 1100px;
            width: 92%;
            margin: 0 auto;
        }

        h1 {
            color: #1f2937;
            margin-bottom: 8px;
            font-size: 2.2em;
        }

        .subtitle {
            color: #666;
            margin-bottom: 24px;
        }

        .upload-area {
            border: 2px dashed #cbd5e0;
            border-radius: 12px;
            padding: 36px 20px;
            cursor: pointer;
            transition: all 0.3s ease;
            background: #f8fafc;
            text-align: center;
        }

        .upload-area:hover, .upload-area.drag-over {
            border-color: #1e90ff;
            background: #eef6ff;
        }

        .upload-text {
            font-size: 1.15em;
            color: #4a5568;
            margin-bottom: 8px;
        }

        .upload-hint {
            color: #718096;
            font-size: 0.9em;
        }

        #fileInput {
            display: none;
        }

        .loading {
            display: none;
            color: #1e90ff;
            margin: 20px 0;
        }

        .spinner {
            border: 3px solid #f3f3f3;
            border-top: 3px solid #1e90ff;
            border-radius: 50%;
            width: 26px;
            height: 26px;
            animation: spin 1s linear infinite;
            display: inline-block;
            vertical-align: middle;
            margin-right: 10px;
        }

        @keyframes spin {
            0% { transform: rotate(0deg); }
            100% { transform: rotate(360deg); }
        }

        .error {
            display: none;
            margin-top: 20px;
            padding: 14px 18px;
            border-radius: 10px;
            background: #fdecea;
            color: #b42318;
            border: 1px solid #f5c2c0;
        }

        .status {
            margin-top: 20px;
            color: #2f855a;
        }

        .results {
            margin-top: 24px;
        }

        .chart-row svg {
            width: 100%;
            height: auto;
        }

        .columns {
            display: flex;
            gap: 24px;
            margin-top: 20px;
        }

        .column {
            flex: 1;
            min-width: 0;
        }

        .original, .heatmap {
            width: 100%;
            height: auto;
            border-radius: 6px;
        }

        .heatmap {
            image-rendering: pixelated;
        }

        .heatmap-row {
            display: flex;
            align-items: stretch;
            gap: 8px;
        }

        .heatmap-row .heatmap {
            flex: 1;
            min-width: 0;
        }

        .colorbar svg {
            height: 100%;
            width: auto;
        }

        .caption {
            color: #666;
            font-size: 0.9em;
            margin-top: 8px;
            text-align: center;
        }

        @media (max-width: 768px) {
            .container {
                padding: 20px;
            }

            .columns {
                flex-direction: column;
            }
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>ResNet-50 Image Classifier</h1>
        <p class="subtitle">Upload a photo to see the five most likely ImageNet categories and which pixels drove the top prediction.</p>

        <div class="upload-area" id="uploadArea">
            <div class="upload-text">Upload Image: click or drop a file here</div>
            <div class="upload-hint">PNG or JPEG, up to 50 MB</div>
        </div>

        <input type="file" id="fileInput" accept=".png,.jpg,.jpeg">

        <div class="loading" id="loading">
            <div class="spinner"></div>
            <span>Classifying and computing attributions...</span>
        </div>

        <div class="error" id="error"></div>
        <div class="results" id="results"></div>
    </div>

    <script>
        const uploadArea = document.getElementById('uploadArea');
        const fileInput = document.getElementById('fileInput');
        const loading = document.getElementById('loading');
        const errorBox = document.getElementById('error');
        const results = document.getElementById('results');

        uploadArea.addEventListener('click', () => {
            fileInput.click();
        });

        fileInput.addEventListener('change', (e) => {
            handleFile(e.target.files[0]);
            fileInput.value = '';
        });

        uploadArea.addEventListener('dragover', (e) => {
            e.preventDefault();
            uploadArea.classList.add('drag-over');
        });

        uploadArea.addEventListener('dragleave', (e) => {
            e.preventDefault();
            uploadArea.classList.remove('drag-over');
        });

        uploadArea.addEventListener('drop', (e) => {
            e.preventDefault();
            uploadArea.classList.remove('drag-over');
            handleFile(e.dataTransfer.files[0]);
        });

        function showError(message) {
            results.innerHTML = '';
            errorBox.textContent = message;
            errorBox.style.display = 'block';
        }

        async function handleFile(file) {
            if (!file) return;

            uploadArea.querySelector('.upload-text').textContent = 'Selected: ' + file.name;
            errorBox.style.display = 'none';
            results.innerHTML = '';
            loading.style.display = 'block';

            try {
                const formData = new FormData();
                formData.append('file', file);

                const response = await fetch('/api/classify', {
                    method: 'POST',
                    body: formData
                });

                let result;
                try {
                    result = await response.json();
                } catch (_) {
                    throw new Error('An error occurred: server returned status ' + response.status);
                }

                if (result.success) {
                    results.innerHTML =
                        '<p class="status">Model loaded successfully.</p>' + result.data.html;
                } else {
                    throw new Error(result.error?.message || 'An error occurred: unknown failure');
                }
            } catch (error) {
                const message = error.message.startsWith('An error occurred')
                    ? error.message
                    : 'An error occurred: ' + error.message;
                showError(message);
                console.error('Error:', error);
            } finally {
                loading.style.display = 'none';
            }
        }
    </script>
</body>
</html>"#;
