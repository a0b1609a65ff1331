//! End-to-end flow behavior against an in-memory model client.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{defaults, png_uri, wav_uri, ScriptedClient};
use serde_json::json;
use shiksha_flows::education::{self, content, fluency, questions, quiz, visual_aid, worksheets};
use shiksha_flows::game::{self, GameDocument};
use shiksha_flows::{
    DataUri, Error, ErrorKind, FailureOrigin, HarmCategory, InvokeOptions, Modality, ModelClient,
    ModelRequest, ModelResponse, ServiceErrorClass,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_answer_question_scenario() {
    let client = ScriptedClient::json(json!({
        "simplifiedExplanation":
            "Sunlight bounces off tiny bits of air, and blue light bounces the most.",
        "analogy": "Like a ball that bounces more on a hard floor than on a carpet."
    }));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let answer = questions::typed(&registry)
        .unwrap()
        .invoke(&questions::AnswerStudentQuestionInput {
            question: "Why is the sky blue?".into(),
        })
        .await
        .unwrap();

    assert!(!answer.simplified_explanation.is_empty());
    assert!(!answer.analogy.is_empty());
    assert_eq!(client.calls(), 1);

    let request = &client.requests()[0];
    assert!(request.text.contains("Why is the sky blue?"));
    assert!(request.structured);
    assert_eq!(request.modalities, vec![Modality::Text]);
}

#[tokio::test]
async fn test_short_question_rejected_before_model_call() {
    let client = ScriptedClient::json(json!({}));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let err = registry
        .invoke(questions::NAME, json!({ "question": "sky?" }))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.stage(), Some(FailureOrigin::Input));
    assert_eq!(err.violations()[0].path, "question");
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_undeclared_input_fields_rejected() {
    let client = ScriptedClient::json(json!({}));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let err = registry
        .invoke(
            content::NAME,
            json!({ "prompt": "A short story about the monsoon", "language": "hi" }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("language"));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_worksheets_render_media_and_grades() {
    let client = ScriptedClient::json(json!({
        "worksheets": ["# Grade 2\n1. Name the parts.", "# Grade 3\n1. Explain photosynthesis."]
    }));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let output = worksheets::typed(&registry)
        .unwrap()
        .invoke(&worksheets::GenerateWorksheetsInput {
            textbook_image: png_uri(),
            target_grades: vec![2, 3],
        })
        .await
        .unwrap();

    assert_eq!(output.worksheets.len(), 2);
    let request = &client.requests()[0];
    assert!(request.text.contains("Target Grades: 2,3"));
    assert_eq!(request.media.len(), 1);
    assert_eq!(request.media[0].mime_type(), "image/png");
}

#[tokio::test]
async fn test_empty_grades_rejected() {
    let client = ScriptedClient::json(json!({}));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let err = registry
        .invoke(
            worksheets::NAME,
            json!({ "textbookImage": png_uri(), "targetGrades": [] }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.violations()[0].path, "targetGrades");
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_mismatched_media_never_reaches_model() {
    let client = ScriptedClient::json(json!({}));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let err = registry
        .invoke(
            worksheets::NAME,
            json!({ "textbookImage": wav_uri(), "targetGrades": [4] }),
        )
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::InvalidMedia { field, .. } if field == "textbookImage"));
    assert_eq!(err.stage(), Some(FailureOrigin::Render));

    let err = registry
        .invoke(fluency::NAME, json!({ "audioDataUri": "data:audio/wav;base64," }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidMedia);

    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_fluency_score_coerced_and_bounded() {
    let client = ScriptedClient::new(|index, _| {
        let body = if index == 0 {
            json!({ "fluencyScore": "7", "feedback": "Good pace; pause at full stops." })
        } else {
            json!({ "fluencyScore": 11, "feedback": "Excellent." })
        };
        Ok(ModelResponse::from_text(body.to_string()))
    });
    let registry = education::registry(client.clone(), &defaults()).unwrap();
    let flow = fluency::typed(&registry).unwrap();
    let input = fluency::AssessReadingFluencyInput {
        audio_data_uri: wav_uri(),
    };

    let first = flow.invoke(&input).await.unwrap();
    assert_eq!(first.fluency_score, 7.0);

    let err = flow.invoke(&input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    assert_eq!(err.violations()[0].path, "fluencyScore");
    assert_eq!(client.requests()[0].media[0].mime_type(), "audio/wav");
}

#[tokio::test]
async fn test_unparseable_output_is_malformed() {
    let client = ScriptedClient::new(|_, _| {
        Ok(ModelResponse::from_text("Here is some content about rivers."))
    });
    let registry = education::registry(client, &defaults()).unwrap();

    let err = registry
        .invoke(content::NAME, json!({ "prompt": "Write about rivers of India" }))
        .await
        .unwrap_err();

    match err {
        Error::MalformedOutput { raw, .. } => {
            assert_eq!(raw.as_deref(), Some("Here is some content about rivers."))
        }
        other => panic!("expected MalformedOutput, got {other:?}"),
    }
}

#[tokio::test]
async fn test_visual_aid_drafts_then_draws() {
    let image = DataUri::from_bytes("image/png", b"diagram");
    let drawn = image.clone();
    let client = ScriptedClient::new(move |index, _| match index {
        0 => Ok(ModelResponse::from_text(
            "  A simple labelled line diagram of the water cycle.  ",
        )),
        _ => Ok(ModelResponse::from_text("Here is the diagram.").with_media(drawn.clone())),
    });
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let output = visual_aid::typed(&registry)
        .unwrap()
        .invoke(&visual_aid::GenerateVisualAidInput {
            concept_description: "The water cycle".into(),
        })
        .await
        .unwrap();

    assert_eq!(output.image().unwrap(), image);

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].text.contains("Concept Description: The water cycle"));
    assert_eq!(requests[0].modalities, vec![Modality::Text]);
    assert!(!requests[0].structured);
    assert_eq!(requests[0].model, common::TEST_MODEL);

    assert_eq!(requests[1].text, "A simple labelled line diagram of the water cycle.");
    assert_eq!(requests[1].model, visual_aid::IMAGE_MODEL);
    assert_eq!(requests[1].modalities, vec![Modality::Text, Modality::Image]);
    assert!(!requests[1].structured);
    assert_eq!(requests[1].safety, visual_aid::safety_policy());
}

#[tokio::test]
async fn test_visual_aid_text_only_response_is_malformed() {
    let client = ScriptedClient::new(|_, _| Ok(ModelResponse::from_text("A diagram of a plant.")));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let err = registry
        .invoke(visual_aid::NAME, json!({ "conceptDescription": "Parts of a plant" }))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    assert_eq!(err.stage(), Some(FailureOrigin::Output));
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_visual_aid_empty_draft_stops_early() {
    let client = ScriptedClient::new(|_, _| Ok(ModelResponse::from_text("   ")));
    let registry = education::registry(client.clone(), &defaults()).unwrap();

    let err = registry
        .invoke(visual_aid::NAME, json!({ "conceptDescription": "Parts of a plant" }))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_quiz_string_is_not_parsed_by_flow() {
    let client = ScriptedClient::json(json!({ "quiz": "{ this is not json" }));
    let registry = education::registry(client, &defaults()).unwrap();

    let output = quiz::typed(&registry)
        .unwrap()
        .invoke(&quiz::GenerateGameInput {
            topic: "Parts of a plant".into(),
        })
        .await
        .unwrap();

    assert_eq!(output.quiz, "{ this is not json");
    assert!(matches!(
        output.classify(),
        Err(game::GameFormatError::UnexpectedFormat { .. })
    ));
}

#[tokio::test]
async fn test_quiz_mcq_classified_and_scored() {
    let document = json!({
        "type": "mcq",
        "title": "Parts of a Plant",
        "questions": [
            { "question": "Which part makes food?", "options": ["Root", "Leaf"], "answer": "Leaf" }
        ]
    });
    let client = ScriptedClient::json(json!({ "quiz": document.to_string() }));
    let registry = education::registry(client, &defaults()).unwrap();

    let output = registry
        .invoke(quiz::NAME, json!({ "topic": "Plants" }))
        .await
        .unwrap();
    let raw = output["quiz"].as_str().unwrap();

    let GameDocument::Mcq(quiz) = game::classify(raw).unwrap() else {
        panic!("expected a multiple-choice quiz");
    };
    let score = quiz.score(&HashMap::from([(0, "Leaf".to_string())]));
    assert_eq!((score.correct, score.total), (1, 1));
}

#[tokio::test]
async fn test_model_failures_propagate_unchanged() {
    let client = ScriptedClient::new(|index, _| {
        Err(if index == 0 {
            Error::ContentBlocked {
                category: Some(HarmCategory::HateSpeech),
                reason: "SAFETY".into(),
            }
        } else {
            Error::ModelService {
                class: ServiceErrorClass::RateLimited,
                status: Some(429),
                message: "Resource has been exhausted".into(),
                retry_after_ms: Some(1000),
            }
        })
    });
    let registry = education::registry(client, &defaults()).unwrap();
    let input = json!({ "topic": "Fractions" });

    let blocked = registry.invoke(quiz::NAME, input.clone()).await.unwrap_err();
    assert!(matches!(
        blocked,
        Error::ContentBlocked { category: Some(HarmCategory::HateSpeech), .. }
    ));
    assert!(!blocked.is_retryable());
    assert_eq!(blocked.stage(), Some(FailureOrigin::Model));

    let limited = registry.invoke(quiz::NAME, input).await.unwrap_err();
    assert!(limited.is_retryable());
    assert!(matches!(limited, Error::ModelService { retry_after_ms: Some(1000), .. }));
}

#[derive(Debug)]
struct StalledClient;

#[async_trait]
impl ModelClient for StalledClient {
    async fn generate(&self, _request: &ModelRequest<'_>) -> shiksha_flows::Result<ModelResponse> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(ModelResponse::default())
    }
}

#[tokio::test]
async fn test_cancellation_aborts_pending_call() {
    let registry = education::registry(Arc::new(StalledClient), &defaults()).unwrap();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        registry.invoke_with(
            content::NAME,
            json!({ "prompt": "Explain the water cycle" }),
            InvokeOptions::with_cancel(token),
        ),
    )
    .await
    .expect("cancellation should end the invocation")
    .unwrap_err();

    assert!(matches!(
        err,
        Error::ModelService { class: ServiceErrorClass::Cancelled, .. }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let client = ScriptedClient::new(|_, request| {
        let question = request
            .text
            .lines()
            .find(|l| l.starts_with("Question "))
            .unwrap_or_default()
            .to_string();
        Ok(ModelResponse::from_text(
            json!({ "simplifiedExplanation": question, "analogy": "n/a" }).to_string(),
        ))
    });
    let registry = Arc::new(education::registry(client.clone(), &defaults()).unwrap());
    let flow = questions::typed(&registry).unwrap();

    let invocations = (0..8).map(|i| {
        let flow = flow.clone();
        async move {
            let input = questions::AnswerStudentQuestionInput {
                question: format!("Question {} about gravity", i),
            };
            (i, flow.invoke(&input).await)
        }
    });
    let results = futures::future::join_all(invocations).await;

    for (i, result) in results {
        let answer = result.unwrap();
        assert_eq!(answer.simplified_explanation, format!("Question {} about gravity", i));
    }
    assert_eq!(client.calls(), 8);
}

#[test]
fn test_registry_holds_all_flows() {
    let registry = education::registry(ScriptedClient::json(json!({})), &defaults()).unwrap();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
        names,
        vec![
            "answerStudentQuestionFlow",
            "assessReadingFluencyFlow",
            "generateEducationalContentFlow",
            "generateGameFlow",
            "generateVisualAidFlow",
            "generateWorksheetsFlow",
        ]
    );

    let desc = registry.get(visual_aid::NAME).unwrap().describe();
    assert_eq!(desc["outputMode"], "image");
    assert_eq!(desc["model"]["model"], visual_aid::IMAGE_MODEL);
    assert_eq!(desc["draft"]["modalities"], json!(["text"]));
    assert_eq!(
        desc["model"]["safety"]["HARM_CATEGORY_SEXUALLY_EXPLICIT"],
        "BLOCK_LOW_AND_ABOVE"
    );

    assert_eq!(
        registry.get("missingFlow").unwrap_err().kind(),
        ErrorKind::UnknownFlow
    );
}
