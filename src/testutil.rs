//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::entity::EntityProxy;
use crate::metadata::models::DEFAULT_MAX_PAGE_SIZE;
use crate::metadata::{EntityTypeSchema, ServiceDescriptor, parser};
use crate::session::{Session, SessionConfig};
use crate::transport::mock::MockTransport;

pub const SAMPLE_EDMX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0"
           xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx"
           xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"
           xmlns:sap="http://www.sap.com/Protocols/SAPData">
  <edmx:DataServices m:DataServiceVersion="2.0">
    <Schema Namespace="c4codataapi" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">
      <EntityType Name="CorporateAccount">
        <Key>
          <PropertyRef Name="ObjectID"/>
        </Key>
        <Property Name="ObjectID" Type="Edm.String" Nullable="false" MaxLength="70"/>
        <Property Name="AccountID" Type="Edm.String" Nullable="true" MaxLength="10"/>
        <Property Name="Name" Type="Edm.String" Nullable="true" MaxLength="40"/>
        <Property Name="RoleCode" Type="Edm.String" Nullable="true" MaxLength="10"/>
        <Property Name="ABCClassification" Type="Edm.String" Nullable="true" MaxLength="1"/>
        <Property Name="LifeCycleStatusCode" Type="Edm.String" Nullable="false" MaxLength="2"/>
        <Property Name="AnnualRevenue" Type="Edm.Decimal" Nullable="true"/>
        <Property Name="EmployeeCount" Type="Edm.Int32" Nullable="true"/>
        <Property Name="Blocked" Type="Edm.Boolean" Nullable="true"/>
        <Property Name="CreatedOn" Type="Edm.DateTime" Nullable="true"/>
        <NavigationProperty Name="CorporateAccountAddress"/>
      </EntityType>
      <EntityType Name="Contact">
        <Key>
          <PropertyRef Name="ObjectID"/>
        </Key>
        <Property Name="ObjectID" Type="Edm.String" Nullable="false" MaxLength="70"/>
        <Property Name="FirstName" Type="Edm.String" Nullable="true" MaxLength="40"/>
        <Property Name="LastName" Type="Edm.String" Nullable="true" MaxLength="40"/>
      </EntityType>
      <EntityContainer Name="c4codataapi_Entities" m:IsDefaultEntityContainer="true">
        <EntitySet Name="CorporateAccountCollection"
                   EntityType="c4codataapi.CorporateAccount"
                   sap:creatable="true" sap:updatable="true" sap:deletable="false"/>
        <EntitySet Name="ContactCollection" EntityType="c4codataapi.Contact"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

pub fn service_descriptor() -> Arc<ServiceDescriptor> {
    Arc::new(ServiceDescriptor {
        name: "c4c".to_string(),
        endpoint: "/sap/c4c/odata/v1/c4codataapi".to_string(),
        max_page_size: DEFAULT_MAX_PAGE_SIZE,
    })
}

/// Schema of CorporateAccountCollection, obtained through the real parser.
pub fn account_schema() -> Arc<EntityTypeSchema> {
    parser::parse_service_metadata(SAMPLE_EDMX, &service_descriptor())
        .unwrap()
        .into_iter()
        .find(|s| s.entity_set == "CorporateAccountCollection")
        .unwrap()
}

/// A fetched-looking account proxy with the given key and an ETag.
pub fn account_proxy(object_id: &str) -> EntityProxy {
    let record = serde_json::json!({
        "__metadata": {
            "uri": format!("CorporateAccountCollection('{object_id}')"),
            "type": "c4codataapi.CorporateAccount",
            "etag": format!("W/\"{object_id}-v1\""),
        },
        "ObjectID": object_id,
        "AccountID": "1001",
        "Name": "Initial",
        "RoleCode": "CRM000",
        "ABCClassification": "A",
        "LifeCycleStatusCode": "1",
    });
    EntityProxy::from_record(account_schema(), record.as_object().unwrap())
}

pub fn mock_session() -> (Session, MockTransport) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mock = MockTransport::new();
    let session = Session::with_transport(
        SessionConfig::new("host.example.com", "USER", "secret"),
        Box::new(mock.clone()),
    )
    .unwrap();
    (session, mock)
}
