mod common;

use common::{client, param, reply, test_config, FakeHttp, CONE_M82, REGISTRY_CONE, SESAME_M82};
use navo_query::app::ports::TransportError;
use navo_query::{
    ConeOptions, CoordInput, CoordList, ErrorHandling, RadiusArg, RegistryFilter, ServiceSet, VoClient,
    VoError,
};

#[tokio::test]
async fn one_table_per_position_with_provenance() {
    let http = FakeHttp::new(|req| reply(req, 200, CONE_M82));
    let vo = client(http.clone());

    let coords = CoordList(vec![CoordInput::from((148.97, 69.68)), CoordInput::from("10.68,41.27")]);
    let tables = vo
        .cone()
        .query(coords, 0.1, Some(ServiceSet::from("http://cone.example/rosmaster")))
        .await
        .unwrap();

    assert_eq!(tables.len(), 2);
    let requests = http.requests();
    assert_eq!(param(&requests[0].query, "RA"), Some("148.97"));
    assert_eq!(param(&requests[0].query, "DEC"), Some("69.68"));
    assert_eq!(param(&requests[0].query, "SR"), Some("0.1"));
    assert_eq!(param(&requests[1].query, "RA"), Some("10.68"));
    assert_eq!(param(&requests[1].query, "DEC"), Some("41.27"));

    let first = &tables[0];
    assert_eq!(first.len(), 2);
    assert_eq!(first.column_names(), vec!["name", "ra", "dec", "exposure"]);
    assert!(first.rows[1][3].is_null());
    assert_eq!(first.meta.url, vec!["http://cone.example/rosmaster?RA=148.97&DEC=69.68&SR=0.1"]);
    assert_eq!(first.meta.xml_raw[0], CONE_M82);
    assert!(first.meta.error.is_empty());
}

#[tokio::test]
async fn radius_list_must_match_positions() {
    let http = FakeHttp::new(|req| reply(req, 200, CONE_M82));
    let vo = client(http.clone());

    let err = vo
        .cone()
        .query(
            vec![(1.0, 2.0), (3.0, 4.0)],
            RadiusArg::from(vec![0.1, 0.2, 0.3]),
            Some(ServiceSet::from("http://cone.example/a?")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VoError::InvalidInput(_)));
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn per_position_radii_are_sent() {
    let http = FakeHttp::new(|req| reply(req, 200, CONE_M82));
    let vo = client(http.clone());

    vo.cone()
        .query(
            vec![(1.0, 2.0), (3.0, 4.0)],
            vec![0.5, 0.25],
            Some(ServiceSet::from("http://cone.example/a?")),
        )
        .await
        .unwrap();
    let radii: Vec<_> = http
        .requests()
        .iter()
        .map(|r| param(&r.query, "SR").unwrap().to_string())
        .collect();
    assert_eq!(radii, vec!["0.5", "0.25"]);
}

#[tokio::test]
async fn discovers_services_in_registry_when_none_given() {
    let http = FakeHttp::new(|req| {
        if req.url.contains("RegTAP") {
            reply(req, 200, REGISTRY_CONE)
        } else {
            reply(req, 200, CONE_M82)
        }
    });
    let vo = client(http.clone());

    let options = ConeOptions {
        max_services: Some(2),
        registry: RegistryFilter::default().waveband("x-ray"),
    };
    let tables = vo
        .cone()
        .query_with((148.97, 69.68), 0.05, None, &options)
        .await
        .unwrap();
    assert_eq!(tables.len(), 2);

    let requests = http.requests();
    assert_eq!(requests.len(), 3);
    let registry = &requests[0];
    assert_eq!(registry.url, "http://vao.stsci.edu/RegTAP/TapService.aspx/sync");
    let adql = param(&registry.form, "query").unwrap();
    assert!(adql.contains("cap.cap_type='conesearch'"));
    assert!(adql.contains("res.waveband like '%x-ray%'"));

    // Only the first two registry rows are visited, in order
    assert_eq!(requests[1].url, "http://cone.example/rosmaster?table=rosmaster&");
    assert_eq!(requests[2].url, "http://cone.example/chanmaster?");
}

#[tokio::test]
async fn unreadable_reply_becomes_empty_table() {
    let http = FakeHttp::new(|req| reply(req, 200, "<html><body>Service down for maintenance</body></html>"));
    let vo = client(http);

    let tables = vo
        .cone()
        .query((10.0, 20.0), 0.1, Some(ServiceSet::from("http://cone.example/a?")))
        .await
        .unwrap();
    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert!(table.is_empty());
    assert!(table.meta.xml_raw[0].contains("maintenance"));
    assert_eq!(table.meta.url.len(), 1);
    assert_eq!(table.meta.error.len(), 1);
}

#[tokio::test]
async fn timeouts_are_retried_then_recorded() {
    let http = FakeHttp::new(|_| Err(TransportError::Timeout));
    let vo = client(http.clone());

    let tables = vo
        .cone()
        .query((10.0, 20.0), 0.1, Some(ServiceSet::from("http://slow.example/cone?")))
        .await
        .unwrap();
    assert_eq!(http.request_count(), 3);
    assert_eq!(tables.len(), 1);
    assert!(tables[0].is_empty());
    assert_eq!(tables[0].meta.url, vec!["http://slow.example/cone?"]);
    assert!(tables[0].meta.error[0].contains("timed out"));
}

#[tokio::test]
async fn stop_on_first_error_propagates() {
    let http = FakeHttp::new(|_| Err(TransportError::Connect("connection refused".into())));
    let mut config = test_config();
    config.query.error_handling = ErrorHandling::StopOnFirstError;
    let vo = VoClient::with_http(http.clone(), config);

    let err = vo
        .cone()
        .query(
            vec![(1.0, 2.0), (3.0, 4.0)],
            0.1,
            Some(ServiceSet::from("http://down.example/cone?")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VoError::Connection { attempts: 3, .. }));
    assert_eq!(http.request_count(), 3);
}

#[tokio::test]
async fn object_names_are_resolved_first() {
    let http = FakeHttp::new(|req| {
        if req.url.contains("nph-sesame") {
            reply(req, 200, SESAME_M82)
        } else {
            reply(req, 200, CONE_M82)
        }
    });
    let vo = client(http.clone());

    vo.cone()
        .query("M82", 0.2, Some(ServiceSet::from("http://cone.example/a?")))
        .await
        .unwrap();
    let requests = http.requests();
    assert_eq!(requests[0].url, "https://cds.unistra.fr/cgi-bin/nph-sesame/-ox/~SNV?M82");
    assert_eq!(param(&requests[1].query, "RA"), Some("148.96845833"));
    assert_eq!(param(&requests[1].query, "DEC"), Some("69.67970278"));
}
