use super::common::*;
use crate::registro::UserId;
use crate::workflows::convocatorias::domain::{EstadoPostulacion, Postulacion};
use crate::workflows::convocatorias::rendicion::{EstadoDigital, EstadoFisico};
use crate::workflows::convocatorias::service::PostulacionServiceError;
use crate::workflows::convocatorias::repository::PostulacionRepository;
use crate::workflows::expedientes::domain::TransitionError;
use chrono::NaiveDate;

fn selected(fixture: &Fixture) -> Postulacion {
    let postulacion = submitted(fixture);
    fixture.service.pick_up_for_review(&postulacion.id).expect("pickup");
    fixture.service.admit(&postulacion.id).expect("admit");
    fixture.service.hand_to_jury(&postulacion.id).expect("jury");
    fixture
        .service
        .decide(&postulacion.id, true, &admin(), now())
        .expect("select")
}

#[test]
fn bulk_creation_reports_per_row_outcomes() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);
    let borrador = {
        // Second applicant still drafting: not eligible for a report.
        let otra = UserId("beto".to_string());
        fixture.registry.agregar_humana(persona_completa(otra.clone()));
        let postulacion = match fixture
            .service
            .inscribirse(&otra, &fomento(), now())
            .expect("start")
        {
            crate::workflows::convocatorias::service::InscribirseOutcome::Postulacion {
                postulacion,
                ..
            } => postulacion,
            other => panic!("expected application, got {other:?}"),
        };
        postulacion
    };

    let ids = vec![
        seleccionada.id.clone(),
        borrador.id.clone(),
        crate::workflows::expedientes::domain::PostulacionId("post-fantasma".to_string()),
    ];
    let outcome = fixture.service.create_rendiciones(&ids, &admin(), now());

    // The selected row already got its report on selection.
    assert_eq!(outcome.already_in_state, vec![seleccionada.id.0.clone()]);
    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.rejected.len(), 2);
    assert!(outcome.rejected.iter().any(|(id, _)| id == &borrador.id.0));
    assert!(outcome
        .rejected
        .iter()
        .any(|(id, reason)| id == "post-fantasma" && reason == "not found"));
}

#[test]
fn bulk_creation_is_idempotent() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);
    let ids = vec![seleccionada.id.clone()];

    let first = fixture.service.create_rendiciones(&ids, &admin(), now());
    let second = fixture.service.create_rendiciones(&ids, &admin(), now());

    assert_eq!(first.already_in_state.len(), 1);
    assert_eq!(second.already_in_state.len(), 1);
    assert!(second.succeeded.is_empty());

    let rendicion = fixture
        .service
        .rendicion(&seleccionada.id)
        .expect("lookup")
        .expect("exists");
    // Exactly one creation event despite three create attempts.
    assert_eq!(
        rendicion.eventos.iter().filter(|e| e.accion == "creacion").count(),
        1
    );
}

#[test]
fn existing_report_resyncs_owner_with_application() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);

    // The applicant account was replaced after selection.
    let mut cambiada = fixture
        .postulaciones
        .fetch(&seleccionada.id)
        .expect("fetch")
        .expect("exists");
    cambiada.user = UserId("apoderado".to_string());
    fixture.postulaciones.update(cambiada).expect("update");

    let outcome =
        fixture
            .service
            .create_rendiciones(&[seleccionada.id.clone()], &admin(), now());
    assert_eq!(outcome.already_in_state.len(), 1);

    let rendicion = fixture
        .service
        .rendicion(&seleccionada.id)
        .expect("lookup")
        .expect("exists");
    assert_eq!(rendicion.user, UserId("apoderado".to_string()));
    assert!(rendicion.eventos.iter().any(|e| e.accion == "resincronizacion"));
}

#[test]
fn digital_track_walks_observe_and_correct_cycle() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);

    fixture
        .service
        .submit_rendicion(
            &seleccionada.id,
            &user(),
            Some("https://drive.example/carpeta".to_string()),
            Some("rendición completa".to_string()),
            now(),
        )
        .expect("submit");
    fixture
        .service
        .observe_rendicion(&seleccionada.id, "Faltan comprobantes".to_string(), &admin(), now())
        .expect("observe");
    let subsanada = fixture
        .service
        .subsanar_rendicion(
            &seleccionada.id,
            &user(),
            None,
            Some("comprobantes agregados".to_string()),
            now(),
        )
        .expect("correct");
    assert_eq!(subsanada.estado_digital, EstadoDigital::Subsanado);

    let aprobada = fixture
        .service
        .approve_rendicion(&seleccionada.id, &admin(), now())
        .expect("approve");
    assert_eq!(aprobada.estado_digital, EstadoDigital::Aprobado);

    let acciones: Vec<&str> = aprobada.eventos.iter().map(|e| e.accion.as_str()).collect();
    assert_eq!(
        acciones,
        vec![
            "creacion",
            "envio_digital",
            "observacion_digital",
            "subsanacion_digital",
            "aprobacion_digital",
        ]
    );
}

#[test]
fn approving_the_digital_track_finalizes_the_application() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);
    fixture
        .service
        .submit_rendicion(&seleccionada.id, &user(), None, None, now())
        .expect("submit");
    fixture
        .service
        .approve_rendicion(&seleccionada.id, &admin(), now())
        .expect("approve");

    let cerrada = fixture.service.postulacion(&seleccionada.id).expect("fetch");
    assert_eq!(cerrada.estado, EstadoPostulacion::Finalizado);
}

#[test]
fn physical_track_is_independent_of_digital() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);

    fixture
        .service
        .receive_physical(
            &seleccionada.id,
            NaiveDate::from_ymd_opt(2026, 7, 1).expect("valid"),
            &admin(),
            now(),
        )
        .expect("receive");
    let aprobada = fixture
        .service
        .approve_physical(&seleccionada.id, &admin(), now())
        .expect("approve physical");

    assert_eq!(aprobada.estado_fisico, EstadoFisico::Aprobado);
    assert_eq!(
        aprobada.fecha_recepcion_fisica,
        NaiveDate::from_ymd_opt(2026, 7, 1)
    );
    // Digital side untouched.
    assert_eq!(aprobada.estado_digital, EstadoDigital::Borrador);
}

#[test]
fn double_submit_of_digital_track_is_rejected() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);
    fixture
        .service
        .submit_rendicion(&seleccionada.id, &user(), None, None, now())
        .expect("first");
    let err = fixture
        .service
        .submit_rendicion(&seleccionada.id, &user(), None, None, now())
        .unwrap_err();
    assert!(matches!(
        err,
        PostulacionServiceError::Transition(TransitionError::InvalidState {
            from: "enviado",
            attempted: "enviado",
        })
    ));
}

#[test]
fn rendicion_submission_is_owner_only() {
    let fixture = fixture();
    let seleccionada = selected(&fixture);
    let err = fixture
        .service
        .submit_rendicion(&seleccionada.id, &UserId("otro".to_string()), None, None, now())
        .unwrap_err();
    assert!(matches!(err, PostulacionServiceError::Forbidden));
}
